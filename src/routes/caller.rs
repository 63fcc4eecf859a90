use actix_web::HttpRequest;
use log::info;

use crate::error::{MarketError, MarketResult};
use crate::models::user::Caller;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";

/// Resolves the `session_id` cookie to the user making the request.
pub async fn current_caller(state: &AppState, req: &HttpRequest) -> MarketResult<Caller> {
    let session_id = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            info!("Session ID not found in cookies for {}", req.path());
            return Err(MarketError::Unauthorized("Session ID not found".into()));
        }
    };

    state
        .store
        .find_session_caller(&session_id)
        .await?
        .ok_or_else(|| MarketError::Unauthorized("Invalid or expired session ID".into()))
}

pub fn require_customer(caller: &Caller) -> MarketResult<i32> {
    caller
        .customer_id
        .ok_or_else(|| MarketError::Forbidden("Only customers can do this".into()))
}

pub fn require_worker(caller: &Caller) -> MarketResult<i32> {
    caller
        .worker_id
        .ok_or_else(|| MarketError::Forbidden("Only workers can do this".into()))
}
