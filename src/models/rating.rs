use std::collections::BTreeMap;

use crate::error::{MarketError, MarketResult};

use super::task::Task;

/// Identifier → rating. Ordered so that iteration, and therefore every
/// similarity sum, is deterministic.
pub type RatingVector = BTreeMap<i32, f64>;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub fn validate_rating(rating: i32) -> MarketResult<i32> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(MarketError::InvalidRating(rating))
    }
}

/// A customer's own ratings, keyed by the worker they rated.
///
/// Later tasks for the same worker overwrite earlier ones.
pub fn customer_vector<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> RatingVector {
    tasks
        .into_iter()
        .filter_map(|task| Some((task.worker_id?, f64::from(task.rating?))))
        .collect()
}

/// The ratings a worker received, keyed by the customer who gave them.
pub fn worker_vector<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> RatingVector {
    tasks
        .into_iter()
        .filter_map(|task| Some((task.customer_id, f64::from(task.rating?))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(matches!(validate_rating(0), Err(MarketError::InvalidRating(0))));
        assert!(matches!(validate_rating(6), Err(MarketError::InvalidRating(6))));
    }
}
