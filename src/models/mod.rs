// src/models/mod.rs

pub mod user;
pub mod session;
pub mod worker;
pub mod task;
pub mod rating;
