//! Infrastructure services

mod run_service;

pub use run_service::{create_run_service, RunHandle, RunService};
