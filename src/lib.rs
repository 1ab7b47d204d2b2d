//! Library crate for vote-rounds-back, exposing modules for binaries and tests.

/// Runtime configuration loading.
pub mod config;
/// Persistence layer: entities and round stores.
pub mod dao;
mod dto;
mod error;
/// Timing of instrumented operations.
pub mod metrics;
/// Request limits and per-round IP quotas.
pub mod rate_limit;
/// HTTP routers.
pub mod routes;
/// Business logic and background tasks.
pub mod services;
/// Shared application state and round lifecycle.
pub mod state;
