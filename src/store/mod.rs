//! Persistence seam. Matching and lifecycle code only ever talk to
//! [`MarketStore`]; the HTTP layer picks the implementation at startup.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::error::MarketResult;
use crate::models::task::{NewTask, Task, TaskStatus, TimeWindow};
use crate::models::user::Caller;
use crate::models::worker::{Worker, WorkerStats};

/// Every criterion is optional; an empty filter matches every task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub worker_in: Option<Vec<i32>>,
    pub time_overlaps: Option<TimeWindow>,
    pub customer_id: Option<i32>,
    pub dispatch_id: Option<String>,
    pub rated_only: bool,
}

impl TaskFilter {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_workers(mut self, worker_ids: Vec<i32>) -> Self {
        self.worker_in = Some(worker_ids);
        self
    }

    pub fn overlapping(mut self, window: TimeWindow) -> Self {
        self.time_overlaps = Some(window);
        self
    }

    pub fn for_customer(mut self, customer_id: i32) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn rated(mut self) -> Self {
        self.rated_only = true;
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if let Some(worker_ids) = &self.worker_in {
            match task.worker_id {
                Some(worker_id) if worker_ids.contains(&worker_id) => {}
                _ => return false,
            }
        }
        if let Some(window) = &self.time_overlaps {
            if !task.window().overlaps(window) {
                return false;
            }
        }
        if self.customer_id.is_some_and(|id| task.customer_id != id) {
            return false;
        }
        if let Some(dispatch_id) = &self.dispatch_id {
            if task.dispatch_id.as_deref() != Some(dispatch_id.as_str()) {
                return false;
            }
        }
        !(self.rated_only && task.rating.is_none())
    }
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// `None` returns every worker regardless of availability.
    async fn query_workers(&self, available: Option<bool>) -> MarketResult<Vec<Worker>>;

    async fn find_worker(&self, worker_id: i32) -> MarketResult<Option<Worker>>;

    async fn query_tasks(&self, filter: &TaskFilter) -> MarketResult<Vec<Task>>;

    async fn find_task(&self, task_id: i32) -> MarketResult<Option<Task>>;

    /// Inserts all rows or none of them.
    async fn create_tasks(&self, tasks: &[NewTask]) -> MarketResult<Vec<Task>>;

    /// Compare-and-swap on a single row's status. Returns whether it applied.
    async fn atomic_update_if_status(
        &self,
        task_id: i32,
        expected: TaskStatus,
        new: TaskStatus,
    ) -> MarketResult<bool>;

    /// Moves `task_id` from requested to in-progress for `worker_id` and
    /// vanishes every requested sibling sharing its dispatch id, as one
    /// atomic step. Returns `false` when the task or any sibling has already
    /// been taken.
    async fn accept_dispatched(
        &self,
        task_id: i32,
        worker_id: i32,
        hourly_rate: f64,
        total_cost: f64,
    ) -> MarketResult<bool>;

    /// Sets rating and review on a completed, unrated task owned by `customer_id`.
    async fn set_rating_once(
        &self,
        task_id: i32,
        customer_id: i32,
        rating: i32,
        review: Option<String>,
    ) -> MarketResult<bool>;

    async fn aggregate_worker_stats(&self, worker_id: i32) -> MarketResult<WorkerStats>;

    /// Resolves a live session to its user and marketplace roles.
    async fn find_session_caller(&self, session_id: &str) -> MarketResult<Option<Caller>>;
}
