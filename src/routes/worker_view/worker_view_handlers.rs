use actix_web::{web, HttpRequest, HttpResponse};
use log::info;

use super::worker_view_models::{
    RecommendationsResponse, RecommendedWorker, WorkerProfileResponse, DISPLAYED_RECOMMENDATIONS,
};
use crate::error::MarketError;
use crate::routes::caller::{current_caller, require_customer};
use crate::state::AppState;

// Handler to get a worker's public profile
pub async fn get_worker_profile(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, MarketError> {
    let worker_id = path.into_inner();
    let worker = state
        .store
        .find_worker(worker_id)
        .await?
        .ok_or(MarketError::WorkerNotFound { id: worker_id })?;
    let stats = state.store.aggregate_worker_stats(worker_id).await?;

    Ok(HttpResponse::Ok().json(WorkerProfileResponse::new(&worker, stats)))
}

// Handler to get workers recommended to the calling customer
pub async fn get_recommendations(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let customer_id = require_customer(&caller)?;
    info!("Received recommendation request from {}", caller.user_name);

    let ratings = state.recommender.customer_ratings(customer_id).await?;
    let recommendations = state
        .recommender
        .recommend(&ratings)
        .await?
        .into_iter()
        .take(DISPLAYED_RECOMMENDATIONS)
        .map(RecommendedWorker::from)
        .collect();

    Ok(HttpResponse::Ok().json(RecommendationsResponse { recommendations }))
}
