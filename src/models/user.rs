use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The authenticated user behind a request, with the marketplace roles it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Caller {
    pub user_id: i32,
    pub user_name: String,
    pub customer_id: Option<i32>,
    pub worker_id: Option<i32>,
}
