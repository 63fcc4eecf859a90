use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::NaiveDateTime;
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::models::task::TaskStatus;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidTimeWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("invalid task draft: {0}")]
    InvalidDraft(String),
    #[error("task {task_id} was already taken by another worker")]
    StaleAcceptance { task_id: i32 },
    #[error("cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("task not found: id={id}")]
    TaskNotFound { id: i32 },
    #[error("worker not found: id={id}")]
    WorkerNotFound { id: i32 },
    #[error("task {task_id} is not assigned to the caller")]
    NotAssigned { task_id: i32 },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),
    #[error("task {task_id} is not completed")]
    NotCompleted { task_id: i32 },
    #[error("task {task_id} has already been rated")]
    AlreadyRated { task_id: i32 },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Failures the caller can resolve by re-reading current state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            MarketError::StaleAcceptance { .. }
                | MarketError::InvalidTransition { .. }
                | MarketError::NotCompleted { .. }
                | MarketError::AlreadyRated { .. }
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ResponseError for MarketError {
    fn status_code(&self) -> StatusCode {
        if self.is_conflict() {
            return StatusCode::CONFLICT;
        }
        match self {
            MarketError::InvalidTimeWindow { .. }
            | MarketError::InvalidDraft(_)
            | MarketError::InvalidRating(_) => StatusCode::BAD_REQUEST,
            MarketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketError::NotAssigned { .. } | MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::TaskNotFound { .. } | MarketError::WorkerNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // store internals stay in the log, not the response body
        let message = match self {
            MarketError::Database(_) | MarketError::Internal(_) | MarketError::Config(_) => {
                error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            message,
        })
    }
}
