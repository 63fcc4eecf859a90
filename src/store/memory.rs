use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{MarketStore, TaskFilter};
use crate::error::MarketResult;
use crate::models::session::Session;
use crate::models::task::{NewTask, Task, TaskStatus};
use crate::models::user::Caller;
use crate::models::worker::{Worker, WorkerStats};

#[derive(Default)]
struct Tables {
    workers: BTreeMap<i32, Worker>,
    tasks: BTreeMap<i32, Task>,
    callers: HashMap<i32, Caller>,
    sessions: HashMap<String, Session>,
    next_task_id: i32,
}

/// Store backed by process memory. One lock guards every table, so each
/// trait call is atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_worker(&self, worker: Worker) {
        let mut tables = self.tables.lock().await;
        tables.workers.insert(worker.worker_id, worker);
    }

    /// Inserts a fully formed task, keeping its id. Used to seed history.
    pub async fn insert_task(&self, task: Task) {
        let mut tables = self.tables.lock().await;
        tables.next_task_id = tables.next_task_id.max(task.task_id);
        tables.tasks.insert(task.task_id, task);
    }

    pub async fn add_session(&self, session_id: &str, caller: Caller, expires_at: DateTime<Utc>) {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(
            session_id.to_string(),
            Session {
                session_id: session_id.to_string(),
                user_id: caller.user_id,
                expires_at,
            },
        );
        tables.callers.insert(caller.user_id, caller);
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn query_workers(&self, available: Option<bool>) -> MarketResult<Vec<Worker>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .workers
            .values()
            .filter(|worker| available.map_or(true, |flag| worker.is_available == flag))
            .cloned()
            .collect())
    }

    async fn find_worker(&self, worker_id: i32) -> MarketResult<Option<Worker>> {
        let tables = self.tables.lock().await;
        Ok(tables.workers.get(&worker_id).cloned())
    }

    async fn query_tasks(&self, filter: &TaskFilter) -> MarketResult<Vec<Task>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    async fn find_task(&self, task_id: i32) -> MarketResult<Option<Task>> {
        let tables = self.tables.lock().await;
        Ok(tables.tasks.get(&task_id).cloned())
    }

    async fn create_tasks(&self, tasks: &[NewTask]) -> MarketResult<Vec<Task>> {
        let mut tables = self.tables.lock().await;
        let created_time = Utc::now().naive_utc();
        let mut created = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            tables.next_task_id += 1;
            let task = Task {
                task_id: tables.next_task_id,
                customer_id: new_task.customer_id,
                worker_id: new_task.worker_id,
                title: new_task.title.clone(),
                description: new_task.description.clone(),
                location: new_task.location.clone(),
                start_time: new_task.window.start,
                end_time: new_task.window.end,
                status: TaskStatus::Requested,
                dispatch_id: new_task.dispatch_id.clone(),
                rating: None,
                review: None,
                hourly_rate: None,
                total_cost: None,
                created_time,
            };
            tables.tasks.insert(task.task_id, task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn atomic_update_if_status(
        &self,
        task_id: i32,
        expected: TaskStatus,
        new: TaskStatus,
    ) -> MarketResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.tasks.get_mut(&task_id) {
            Some(task) if task.status == expected => {
                task.status = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn accept_dispatched(
        &self,
        task_id: i32,
        worker_id: i32,
        hourly_rate: f64,
        total_cost: f64,
    ) -> MarketResult<bool> {
        let mut tables = self.tables.lock().await;
        let dispatch_id = match tables.tasks.get(&task_id) {
            Some(task)
                if task.status == TaskStatus::Requested && task.worker_id == Some(worker_id) =>
            {
                task.dispatch_id.clone()
            }
            _ => return Ok(false),
        };

        if let Some(dispatch_id) = &dispatch_id {
            let already_taken = tables.tasks.values().any(|task| {
                task.dispatch_id.as_ref() == Some(dispatch_id)
                    && matches!(task.status, TaskStatus::InProgress | TaskStatus::Completed)
            });
            if already_taken {
                return Ok(false);
            }
            for sibling in tables.tasks.values_mut() {
                if sibling.task_id != task_id
                    && sibling.dispatch_id.as_ref() == Some(dispatch_id)
                    && sibling.status == TaskStatus::Requested
                {
                    sibling.status = TaskStatus::Vanished;
                }
            }
        }

        if let Some(task) = tables.tasks.get_mut(&task_id) {
            task.status = TaskStatus::InProgress;
            task.hourly_rate = Some(hourly_rate);
            task.total_cost = Some(total_cost);
        }
        Ok(true)
    }

    async fn set_rating_once(
        &self,
        task_id: i32,
        customer_id: i32,
        rating: i32,
        review: Option<String>,
    ) -> MarketResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.tasks.get_mut(&task_id) {
            Some(task)
                if task.customer_id == customer_id
                    && task.status == TaskStatus::Completed
                    && task.rating.is_none() =>
            {
                task.rating = Some(rating);
                task.review = review;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn aggregate_worker_stats(&self, worker_id: i32) -> MarketResult<WorkerStats> {
        let tables = self.tables.lock().await;
        Ok(WorkerStats::from_completed(
            tables
                .tasks
                .values()
                .filter(|task| {
                    task.worker_id == Some(worker_id) && task.status == TaskStatus::Completed
                })
                .map(|task| task.rating),
        ))
    }

    async fn find_session_caller(&self, session_id: &str) -> MarketResult<Option<Caller>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(session_id)
            .filter(|session| session.is_live(Utc::now()))
            .and_then(|session| tables.callers.get(&session.user_id))
            .cloned())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 4, 23)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    pub fn worker(worker_id: i32, skills: &str) -> Worker {
        Worker {
            worker_id,
            user_id: 100 + worker_id,
            is_available: true,
            skills: skills.to_string(),
            hourly_rate: 20.0,
        }
    }

    /// A historical task already assigned to `worker_id`.
    pub fn task(task_id: i32, customer_id: i32, worker_id: i32, status: TaskStatus) -> Task {
        Task {
            task_id,
            customer_id,
            worker_id: Some(worker_id),
            title: "Fix sink".to_string(),
            description: String::new(),
            location: "Seoul".to_string(),
            start_time: at(8, 0),
            end_time: at(9, 0),
            status,
            dispatch_id: None,
            rating: None,
            review: None,
            hourly_rate: None,
            total_cost: None,
            created_time: at(7, 0),
        }
    }

    pub fn rated(task_id: i32, customer_id: i32, worker_id: i32, rating: i32) -> Task {
        Task {
            rating: Some(rating),
            ..task(task_id, customer_id, worker_id, TaskStatus::Completed)
        }
    }
}
