use serde::{Deserialize, Serialize};

use crate::matching::recommender::Recommendation;
use crate::models::worker::{Worker, WorkerStats};

/// Recommendations shown on a customer's profile page.
pub const DISPLAYED_RECOMMENDATIONS: usize = 10;

#[derive(Serialize, Deserialize)]
pub struct WorkerProfileResponse {
    pub worker_id: i32,
    pub skills: String,
    pub hourly_rate: f64,
    pub is_available: bool,
    pub completed_tasks_count: Option<i64>,
    pub avg_rating: Option<f64>,
}

impl WorkerProfileResponse {
    /// Zero completions and missing averages are shown as absent; the
    /// average is rounded to one decimal.
    pub fn new(worker: &Worker, stats: WorkerStats) -> Self {
        Self {
            worker_id: worker.worker_id,
            skills: worker.skills.clone(),
            hourly_rate: worker.hourly_rate,
            is_available: worker.is_available,
            completed_tasks_count: (stats.tasks_completed > 0).then_some(stats.tasks_completed),
            avg_rating: stats.avg_rating.map(|avg| (avg * 10.0).round() / 10.0),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct RecommendedWorker {
    pub worker_id: i32,
    pub score: f64,
}

impl From<Recommendation> for RecommendedWorker {
    fn from(recommendation: Recommendation) -> Self {
        Self {
            worker_id: recommendation.worker_id,
            score: recommendation.score,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<RecommendedWorker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_hides_empty_history_and_rounds_average() {
        let worker = Worker {
            worker_id: 3,
            user_id: 30,
            is_available: true,
            skills: "plumbing".into(),
            hourly_rate: 25.0,
        };

        let empty = WorkerProfileResponse::new(&worker, WorkerStats::default());
        assert_eq!(empty.completed_tasks_count, None);
        assert_eq!(empty.avg_rating, None);

        let busy = WorkerProfileResponse::new(
            &worker,
            WorkerStats {
                tasks_completed: 3,
                avg_rating: Some(13.0 / 3.0),
            },
        );
        assert_eq!(busy.completed_tasks_count, Some(3));
        assert_eq!(busy.avg_rating, Some(4.3));
    }
}
