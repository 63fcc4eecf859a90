//! Worker selection for new tasks and worker recommendations for customers.

pub mod dispatcher;
pub mod recommender;
pub mod similarity;
