use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Worker {
    pub worker_id: i32,
    pub user_id: i32,
    pub is_available: bool,
    pub skills: String,
    pub hourly_rate: f64,
}

impl Worker {
    /// Case-insensitive substring match of `query` against the free-text skill tags.
    pub fn has_skill(&self, query: &str) -> bool {
        self.skills.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Completion history used to rank a worker during dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WorkerStats {
    pub tasks_completed: i64,
    pub avg_rating: Option<f64>,
}

impl WorkerStats {
    /// Folds the ratings of a worker's completed tasks; unrated ones still count.
    pub fn from_completed(ratings: impl IntoIterator<Item = Option<i32>>) -> Self {
        let mut tasks_completed = 0;
        let mut rated = 0;
        let mut sum = 0.0;
        for rating in ratings {
            tasks_completed += 1;
            if let Some(rating) = rating {
                rated += 1;
                sum += f64::from(rating);
            }
        }
        Self {
            tasks_completed,
            avg_rating: (rated > 0).then(|| sum / f64::from(rated)),
        }
    }
}
