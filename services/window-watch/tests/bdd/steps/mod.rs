//! BDD step definitions for window watch service

pub mod dashboard_steps;
pub mod engine_steps;
pub mod history_steps;
