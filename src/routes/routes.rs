use actix_web::web;

use super::task_view::task_view_handlers;

pub fn task_view_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-tasks")
            .route("", web::get().to(task_view_handlers::task_view_get))
            .route("/", web::get().to(task_view_handlers::task_view_get))
            .route("/create", web::post().to(task_view_handlers::create_task))
            .route("/accept", web::post().to(task_view_handlers::accept_task))
            .route("/reject", web::post().to(task_view_handlers::reject_task))
            .route("/complete", web::post().to(task_view_handlers::complete_task))
            .route("/rate", web::post().to(task_view_handlers::rate_task))
            .route("/list", web::post().to(task_view_handlers::list_tasks))
    );
}

use super::worker_view::worker_view_handlers;

pub fn worker_view_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-workers")
            .route("/recommendations", web::get().to(worker_view_handlers::get_recommendations))
            .route("/{worker_id}/profile", web::get().to(worker_view_handlers::get_worker_profile))
    );
}
