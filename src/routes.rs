pub mod routes;
pub mod caller;

pub mod task_view {
    pub mod task_view_handlers;
    pub mod task_view_models;
}

pub mod worker_view {
    pub mod worker_view_handlers;
    pub mod worker_view_models;
}
