use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use crate::error::MarketResult;
use crate::models::task::{NewTask, Task, TaskDraft, TaskStatus};
use crate::models::worker::{Worker, WorkerStats};
use crate::store::{MarketStore, TaskFilter};

/// Upper bound on sibling tasks created by one dispatch.
pub const MAX_FAN_OUT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub dispatched_count: usize,
    pub worker_ids: Vec<i32>,
    /// `None` when no worker was eligible and nothing was created.
    pub dispatch_id: Option<String>,
}

impl DispatchResult {
    pub fn empty() -> Self {
        Self {
            dispatched_count: 0,
            worker_ids: Vec::new(),
            dispatch_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedWorker {
    pub worker: Worker,
    pub stats: WorkerStats,
}

/// Workers from `pool` that own none of the `conflicts` and whose skills
/// match `title`, in pool order.
pub fn eligible_workers<'a>(pool: &'a [Worker], conflicts: &[Task], title: &str) -> Vec<&'a Worker> {
    let busy: HashSet<i32> = conflicts.iter().filter_map(|task| task.worker_id).collect();
    pool.iter()
        .filter(|worker| !busy.contains(&worker.worker_id))
        .filter(|worker| worker.has_skill(title))
        .collect()
}

/// Most completed tasks first, then highest average rating; unrated sorts
/// below any rating. Remaining ties fall back to worker id.
pub fn rank(mut candidates: Vec<RankedWorker>) -> Vec<RankedWorker> {
    candidates.sort_by(|a, b| {
        b.stats
            .tasks_completed
            .cmp(&a.stats.tasks_completed)
            .then_with(|| compare_ratings(b.stats.avg_rating, a.stats.avg_rating))
            .then_with(|| a.worker.worker_id.cmp(&b.worker.worker_id))
    });
    candidates
}

fn compare_ratings(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Fans a new task out to the best-ranked eligible workers.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn MarketStore>,
    fan_out: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MarketStore>, fan_out: usize) -> Self {
        Self {
            store,
            fan_out: fan_out.clamp(1, MAX_FAN_OUT),
        }
    }

    pub async fn dispatch(&self, draft: &TaskDraft, customer_id: i32) -> MarketResult<DispatchResult> {
        let window = draft.validated_window()?;

        let pool = self.store.query_workers(Some(true)).await?;
        if pool.is_empty() {
            info!("No available workers for task request '{}'", draft.title);
            return Ok(DispatchResult::empty());
        }

        let conflict_filter = TaskFilter::default()
            .with_status(TaskStatus::InProgress)
            .with_workers(pool.iter().map(|worker| worker.worker_id).collect())
            .overlapping(window);
        let conflicts = self.store.query_tasks(&conflict_filter).await?;

        let eligible = eligible_workers(&pool, &conflicts, &draft.title);
        debug!(
            "Dispatch '{}': {} available, {} busy task(s), {} skill match(es)",
            draft.title,
            pool.len(),
            conflicts.len(),
            eligible.len()
        );
        if eligible.is_empty() {
            info!("No related workers found for task request '{}'", draft.title);
            return Ok(DispatchResult::empty());
        }

        let mut candidates = Vec::with_capacity(eligible.len());
        for worker in eligible {
            let stats = self.store.aggregate_worker_stats(worker.worker_id).await?;
            candidates.push(RankedWorker {
                worker: worker.clone(),
                stats,
            });
        }
        let chosen: Vec<RankedWorker> = rank(candidates).into_iter().take(self.fan_out).collect();

        let dispatch_id = Uuid::new_v4().to_string();
        let siblings: Vec<NewTask> = chosen
            .iter()
            .map(|candidate| {
                NewTask::dispatched(
                    draft,
                    window,
                    customer_id,
                    candidate.worker.worker_id,
                    &dispatch_id,
                )
            })
            .collect();
        let created = self.store.create_tasks(&siblings).await?;

        let worker_ids: Vec<i32> = created.iter().filter_map(|task| task.worker_id).collect();
        info!(
            "{} related workers have been sent task request '{}' (dispatch {}): {:?}",
            worker_ids.len(),
            draft.title,
            dispatch_id,
            worker_ids
        );
        Ok(DispatchResult {
            dispatched_count: created.len(),
            worker_ids,
            dispatch_id: Some(dispatch_id),
        })
    }
}
