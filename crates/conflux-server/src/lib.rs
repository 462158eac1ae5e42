//! HTTP binding for the Conflux flow execution engine.
//!
//! Thin by design: route building, the response envelope, caller-input
//! sourcing, and environment configuration. Everything else lives in
//! `conflux-engine`.

pub mod config;
pub mod response;
pub mod routes;

pub use config::ServerConfig;
pub use response::{ApiError, ApiResponse, Meta};
pub use routes::{build_app, AppState};
