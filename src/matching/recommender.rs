//! Collaborative-filtering worker recommendations.
//!
//! Two modes are available:
//!
//! * [`RecommenderMode::Shape`] correlates the customer's own vector
//!   (keyed by worker id) with each worker's received ratings (keyed by
//!   customer id). The key spaces differ, so shared keys are only id
//!   collisions; the mode compares the *shape* of the two distributions and
//!   is kept because existing deployments rank by it.
//! * [`RecommenderMode::Item`] is item-based filtering over the
//!   customer × worker matrix: workers are compared with each other on the
//!   customers they share, and a worker the customer has not rated yet is
//!   scored by the similarity-weighted mean of the customer's own ratings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use super::similarity::pearson;
use crate::error::{MarketError, MarketResult};
use crate::models::rating::{customer_vector, worker_vector, RatingVector};
use crate::models::task::TaskStatus;
use crate::store::{MarketStore, TaskFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecommenderMode {
    #[default]
    Shape,
    Item,
}

impl fmt::Display for RecommenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommenderMode::Shape => f.write_str("shape"),
            RecommenderMode::Item => f.write_str("item"),
        }
    }
}

impl FromStr for RecommenderMode {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shape" => Ok(RecommenderMode::Shape),
            "item" => Ok(RecommenderMode::Item),
            other => Err(MarketError::config_error(format!(
                "unknown recommender mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub worker_id: i32,
    pub score: f64,
}

/// Keeps positive scores, highest first. The sort is stable, so equal
/// scores stay in input order.
fn positive_descending(scored: impl IntoIterator<Item = (i32, f64)>) -> Vec<Recommendation> {
    let mut kept: Vec<Recommendation> = scored
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .map(|(worker_id, score)| Recommendation { worker_id, score })
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept
}

/// Scores each `(worker_id, received ratings)` directly against the
/// customer's vector.
pub fn rank_by_shape(customer: &RatingVector, workers: &[(i32, RatingVector)]) -> Vec<Recommendation> {
    if customer.is_empty() {
        return Vec::new();
    }
    positive_descending(
        workers
            .iter()
            .map(|(worker_id, received)| (*worker_id, pearson(customer, received))),
    )
}

/// Predicts the customer's rating for every worker they have not rated,
/// weighting their existing ratings by worker-to-worker similarity.
pub fn rank_by_item(customer: &RatingVector, workers: &[(i32, RatingVector)]) -> Vec<Recommendation> {
    if customer.is_empty() {
        return Vec::new();
    }
    let rated: Vec<(&RatingVector, f64)> = workers
        .iter()
        .filter_map(|(worker_id, received)| customer.get(worker_id).map(|&r| (received, r)))
        .collect();

    positive_descending(
        workers
            .iter()
            .filter(|(worker_id, _)| !customer.contains_key(worker_id))
            .map(|(worker_id, received)| {
                let mut weighted = 0.0;
                let mut weight = 0.0;
                for (other, rating) in &rated {
                    let similarity = pearson(received, other);
                    weighted += similarity * rating;
                    weight += similarity.abs();
                }
                let score = if weight == 0.0 { 0.0 } else { weighted / weight };
                (*worker_id, score)
            }),
    )
}

#[derive(Clone)]
pub struct Recommender {
    store: Arc<dyn MarketStore>,
    mode: RecommenderMode,
}

impl Recommender {
    pub fn new(store: Arc<dyn MarketStore>, mode: RecommenderMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> RecommenderMode {
        self.mode
    }

    /// The vector a customer's recommendations are computed from: their own
    /// completed and rated tasks, keyed by worker.
    pub async fn customer_ratings(&self, customer_id: i32) -> MarketResult<RatingVector> {
        let filter = TaskFilter::default()
            .for_customer(customer_id)
            .with_status(TaskStatus::Completed)
            .rated();
        let tasks = self.store.query_tasks(&filter).await?;
        Ok(customer_vector(&tasks))
    }

    /// Every worker with a positive score, best first. Read-only.
    pub async fn recommend(&self, customer_ratings: &RatingVector) -> MarketResult<Vec<Recommendation>> {
        if customer_ratings.is_empty() {
            return Ok(Vec::new());
        }

        let history = self
            .store
            .query_tasks(&TaskFilter::default().with_status(TaskStatus::Completed).rated())
            .await?;
        let workers: Vec<(i32, RatingVector)> = self
            .store
            .query_workers(None)
            .await?
            .into_iter()
            .map(|worker| {
                let received = worker_vector(
                    history
                        .iter()
                        .filter(|task| task.worker_id == Some(worker.worker_id)),
                );
                (worker.worker_id, received)
            })
            .collect();
        debug!(
            "Scoring {} worker(s) against {} customer rating(s) in {} mode",
            workers.len(),
            customer_ratings.len(),
            self.mode
        );

        let recommendations = match self.mode {
            RecommenderMode::Shape => rank_by_shape(customer_ratings, &workers),
            RecommenderMode::Item => rank_by_item(customer_ratings, &workers),
        };
        info!("Recommended {} worker(s)", recommendations.len());
        Ok(recommendations)
    }
}
