use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::info;

use super::task_view_models::{
    CreateTaskRequest, CreateTaskResponse,
    TaskActionRequest, TaskActionResponse,
    RateTaskRequest, TaskListResponse, TaskSummary,
};
use crate::error::MarketError;
use crate::routes::caller::{current_caller, require_customer, require_worker};
use crate::state::AppState;

// Default handler for the task root
pub async fn task_view_get() -> impl Responder {
    HttpResponse::Ok().body("Hello, this is the Task endpoint.")
}

// Submit a task and send it to the best matching workers
pub async fn create_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let customer_id = require_customer(&caller)?;
    let draft = request.to_draft()?;
    info!("Received task request '{}' from {}", draft.title, caller.user_name);

    let result = state.dispatcher.dispatch(&draft, customer_id).await?;
    let message = if result.dispatched_count > 0 {
        format!(
            "Task created successfully! {} related workers have been sent the task request",
            result.dispatched_count
        )
    } else {
        "No related workers found for the task request".to_string()
    };

    Ok(HttpResponse::Ok().json(CreateTaskResponse {
        success: result.dispatched_count > 0,
        message,
        dispatched_count: result.dispatched_count,
        worker_ids: result.worker_ids,
    }))
}

pub async fn accept_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<TaskActionRequest>,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let worker_id = require_worker(&caller)?;

    let task = state.lifecycle.accept(request.task_id, worker_id).await?;
    Ok(HttpResponse::Ok().json(TaskActionResponse {
        success: true,
        message: "Task accepted successfully".to_string(),
        task: TaskSummary::from(&task),
    }))
}

pub async fn reject_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<TaskActionRequest>,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let worker_id = require_worker(&caller)?;

    let task = state.lifecycle.reject(request.task_id, worker_id).await?;
    Ok(HttpResponse::Ok().json(TaskActionResponse {
        success: true,
        message: "Task rejected successfully".to_string(),
        task: TaskSummary::from(&task),
    }))
}

pub async fn complete_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<TaskActionRequest>,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let worker_id = require_worker(&caller)?;

    let task = state.lifecycle.complete(request.task_id, worker_id).await?;
    Ok(HttpResponse::Ok().json(TaskActionResponse {
        success: true,
        message: "Task completed successfully".to_string(),
        task: TaskSummary::from(&task),
    }))
}

pub async fn rate_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<RateTaskRequest>,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let customer_id = require_customer(&caller)?;
    let request = request.into_inner();

    let task = state
        .lifecycle
        .rate(request.task_id, customer_id, request.rating, request.review)
        .await?;
    Ok(HttpResponse::Ok().json(TaskActionResponse {
        success: true,
        message: "Task rated successfully".to_string(),
        task: TaskSummary::from(&task),
    }))
}

// Tasks of the caller, grouped by status
pub async fn list_tasks(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, MarketError> {
    let caller = current_caller(&state, &req).await?;
    let tasks = match (caller.customer_id, caller.worker_id) {
        (Some(customer_id), _) => state.lifecycle.tasks_for_customer(customer_id).await?,
        (None, Some(worker_id)) => state.lifecycle.tasks_for_worker(worker_id).await?,
        (None, None) => Vec::new(),
    };
    Ok(HttpResponse::Ok().json(TaskListResponse::grouped(&tasks)))
}
