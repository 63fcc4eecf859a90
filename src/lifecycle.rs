use std::sync::Arc;

use log::{info, warn};

use crate::error::{MarketError, MarketResult};
use crate::models::rating::validate_rating;
use crate::models::task::{Task, TaskStatus};
use crate::store::{MarketStore, TaskFilter};

/// Status changes a worker or customer can make to an existing task.
#[derive(Clone)]
pub struct TaskLifecycle {
    store: Arc<dyn MarketStore>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    async fn load(&self, task_id: i32) -> MarketResult<Task> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or(MarketError::TaskNotFound { id: task_id })
    }

    async fn load_assigned(&self, task_id: i32, worker_id: i32) -> MarketResult<Task> {
        let task = self.load(task_id).await?;
        if task.worker_id != Some(worker_id) {
            return Err(MarketError::NotAssigned { task_id });
        }
        Ok(task)
    }

    /// Accepts a requested task on behalf of its assigned worker and retires
    /// every requested sibling of the same dispatch.
    pub async fn accept(&self, task_id: i32, worker_id: i32) -> MarketResult<Task> {
        let task = self.load_assigned(task_id, worker_id).await?;
        if task.status == TaskStatus::Vanished {
            return Err(MarketError::StaleAcceptance { task_id });
        }
        task.status.transition(TaskStatus::InProgress)?;

        let worker = self
            .store
            .find_worker(worker_id)
            .await?
            .ok_or(MarketError::WorkerNotFound { id: worker_id })?;
        let total_cost = task.window().hours() * worker.hourly_rate;

        let accepted = self
            .store
            .accept_dispatched(task_id, worker_id, worker.hourly_rate, total_cost)
            .await?;
        if !accepted {
            warn!(
                "Stale acceptance of task {} by worker {} (dispatch {:?})",
                task_id, worker_id, task.dispatch_id
            );
            return Err(MarketError::StaleAcceptance { task_id });
        }

        info!("Worker {} has accepted the task: '{}'", worker_id, task.title);
        self.load(task_id).await
    }

    pub async fn reject(&self, task_id: i32, worker_id: i32) -> MarketResult<Task> {
        let task = self.load_assigned(task_id, worker_id).await?;
        let task = self.move_status(task, TaskStatus::Rejected).await?;
        info!("Worker {} has rejected the task: '{}'", worker_id, task.title);
        Ok(task)
    }

    pub async fn complete(&self, task_id: i32, worker_id: i32) -> MarketResult<Task> {
        let task = self.load_assigned(task_id, worker_id).await?;
        let task = self.move_status(task, TaskStatus::Completed).await?;
        info!("Worker {} has completed the task: '{}'", worker_id, task.title);
        Ok(task)
    }

    async fn move_status(&self, task: Task, next: TaskStatus) -> MarketResult<Task> {
        let from = task.status;
        from.transition(next)?;
        if !self
            .store
            .atomic_update_if_status(task.task_id, from, next)
            .await?
        {
            // somebody else moved it first; report what it is now
            let current = self.load(task.task_id).await?;
            warn!(
                "Task {} changed to {} before it could move to {}",
                task.task_id, current.status, next
            );
            return Err(MarketError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        self.load(task.task_id).await
    }

    /// Records the customer's rating of a completed task. Only once.
    pub async fn rate(
        &self,
        task_id: i32,
        customer_id: i32,
        rating: i32,
        review: Option<String>,
    ) -> MarketResult<Task> {
        let rating = validate_rating(rating)?;
        let task = self.load(task_id).await?;
        if task.customer_id != customer_id {
            return Err(MarketError::NotAssigned { task_id });
        }
        if task.status != TaskStatus::Completed {
            return Err(MarketError::NotCompleted { task_id });
        }
        if task.rating.is_some() {
            return Err(MarketError::AlreadyRated { task_id });
        }

        let review = review.filter(|text| !text.trim().is_empty());
        if !self
            .store
            .set_rating_once(task_id, customer_id, rating, review)
            .await?
        {
            return Err(MarketError::AlreadyRated { task_id });
        }
        info!("Task {} rated {} by customer {}", task_id, rating, customer_id);
        self.load(task_id).await
    }

    /// Newest first.
    pub async fn tasks_for_customer(&self, customer_id: i32) -> MarketResult<Vec<Task>> {
        let filter = TaskFilter::default().for_customer(customer_id);
        Ok(newest_first(self.store.query_tasks(&filter).await?))
    }

    /// Newest first.
    pub async fn tasks_for_worker(&self, worker_id: i32) -> MarketResult<Vec<Task>> {
        let filter = TaskFilter::default().with_workers(vec![worker_id]);
        Ok(newest_first(self.store.query_tasks(&filter).await?))
    }
}

fn newest_first(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        b.created_time
            .cmp(&a.created_time)
            .then_with(|| b.task_id.cmp(&a.task_id))
    });
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{NewTask, TimeWindow};
    use crate::store::memory::fixtures::{at, rated, task, worker};
    use crate::store::memory::MemoryStore;

    async fn dispatched_siblings(store: &MemoryStore, workers: &[i32]) -> Vec<Task> {
        let window = TimeWindow::new(at(10, 0), at(11, 30)).unwrap();
        let siblings: Vec<NewTask> = workers
            .iter()
            .map(|&worker_id| NewTask {
                customer_id: 1,
                worker_id: Some(worker_id),
                title: "Plumbing".into(),
                description: String::new(),
                location: String::new(),
                window,
                dispatch_id: Some("dispatch-1".into()),
            })
            .collect();
        for &worker_id in workers {
            store.add_worker(worker(worker_id, "plumbing")).await;
        }
        store.create_tasks(&siblings).await.unwrap()
    }

    #[tokio::test]
    async fn accept_prices_the_task_and_vanishes_siblings() {
        let store = Arc::new(MemoryStore::new());
        let siblings = dispatched_siblings(&store, &[1, 2, 3]).await;
        let lifecycle = TaskLifecycle::new(store.clone());

        let accepted = lifecycle.accept(siblings[1].task_id, 2).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);
        assert_eq!(accepted.hourly_rate, Some(20.0));
        assert_eq!(accepted.total_cost, Some(30.0));

        for other in [&siblings[0], &siblings[2]] {
            let other = store.find_task(other.task_id).await.unwrap().unwrap();
            assert_eq!(other.status, TaskStatus::Vanished);
        }

        let err = lifecycle.accept(siblings[0].task_id, 1).await.unwrap_err();
        assert!(matches!(err, MarketError::StaleAcceptance { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_acceptance_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let siblings = dispatched_siblings(&store, &[1, 2, 3]).await;
        let lifecycle = TaskLifecycle::new(store.clone());

        let first = {
            let lifecycle = lifecycle.clone();
            let task_id = siblings[0].task_id;
            tokio::spawn(async move { lifecycle.accept(task_id, 1).await })
        };
        let second = {
            let lifecycle = lifecycle.clone();
            let task_id = siblings[1].task_id;
            tokio::spawn(async move { lifecycle.accept(task_id, 2).await })
        };
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|err| matches!(err, MarketError::StaleAcceptance { .. })));

        let third = store.find_task(siblings[2].task_id).await.unwrap().unwrap();
        assert_eq!(third.status, TaskStatus::Vanished);

        let in_progress = store
            .query_tasks(&TaskFilter::default().with_status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
    }

    #[tokio::test]
    async fn only_the_assigned_worker_may_act() {
        let store = Arc::new(MemoryStore::new());
        let siblings = dispatched_siblings(&store, &[1]).await;
        let lifecycle = TaskLifecycle::new(store);

        let err = lifecycle.accept(siblings[0].task_id, 9).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAssigned { .. }));
        let err = lifecycle.reject(siblings[0].task_id, 9).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAssigned { .. }));
    }

    #[tokio::test]
    async fn missing_task_is_reported() {
        let lifecycle = TaskLifecycle::new(Arc::new(MemoryStore::new()));
        let err = lifecycle.accept(42, 1).await.unwrap_err();
        assert!(matches!(err, MarketError::TaskNotFound { id: 42 }));
    }

    #[tokio::test]
    async fn transitions_follow_the_table() {
        let store = Arc::new(MemoryStore::new());
        store.add_worker(worker(1, "plumbing")).await;
        store.insert_task(task(1, 5, 1, TaskStatus::Requested)).await;
        store.insert_task(task(2, 5, 1, TaskStatus::Requested)).await;
        let lifecycle = TaskLifecycle::new(store);

        // requested tasks cannot skip straight to completed
        let err = lifecycle.complete(1, 1).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::InvalidTransition {
                from: TaskStatus::Requested,
                to: TaskStatus::Completed
            }
        ));

        let accepted = lifecycle.accept(1, 1).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);
        let completed = lifecycle.complete(1, 1).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);

        let rejected = lifecycle.reject(2, 1).await.unwrap();
        assert_eq!(rejected.status, TaskStatus::Rejected);
        let err = lifecycle.accept(2, 1).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn rating_rules() {
        let store = Arc::new(MemoryStore::new());
        store.insert_task(task(1, 5, 1, TaskStatus::Completed)).await;
        store.insert_task(task(2, 5, 1, TaskStatus::InProgress)).await;
        store.insert_task(rated(3, 5, 1, 4)).await;
        let lifecycle = TaskLifecycle::new(store);

        assert!(matches!(
            lifecycle.rate(1, 5, 9, None).await.unwrap_err(),
            MarketError::InvalidRating(9)
        ));
        assert!(matches!(
            lifecycle.rate(1, 6, 4, None).await.unwrap_err(),
            MarketError::NotAssigned { .. }
        ));
        assert!(matches!(
            lifecycle.rate(2, 5, 4, None).await.unwrap_err(),
            MarketError::NotCompleted { .. }
        ));
        assert!(matches!(
            lifecycle.rate(3, 5, 4, None).await.unwrap_err(),
            MarketError::AlreadyRated { .. }
        ));

        let rated = lifecycle
            .rate(1, 5, 5, Some("Quick and clean".into()))
            .await
            .unwrap();
        assert_eq!(rated.rating, Some(5));
        assert_eq!(rated.review.as_deref(), Some("Quick and clean"));
    }

    #[tokio::test]
    async fn task_lists_are_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let mut older = task(1, 5, 1, TaskStatus::Completed);
        older.created_time = at(6, 0);
        store.insert_task(older).await;
        store.insert_task(task(2, 5, 2, TaskStatus::Requested)).await;
        store.insert_task(task(3, 6, 1, TaskStatus::Requested)).await;
        let lifecycle = TaskLifecycle::new(store);

        let ids: Vec<i32> = lifecycle
            .tasks_for_customer(5)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(ids, vec![2, 1]);

        let ids: Vec<i32> = lifecycle
            .tasks_for_worker(1)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
