pub mod config;
pub mod error;
pub mod lifecycle;
pub mod matching;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
