//! Teable Intelligence API - HTTP Layer
//!
//! Axum server exposing streaming generation, field backfill and internal
//! event ingestion for AI-backed table fields, plus the Postgres-backed
//! table store the pipeline reads and writes through.

#[macro_use]
mod macros;

pub mod config;
pub mod db;
pub mod error;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{resolve_bind_addr, ApiConfig};
pub use db::{DbConfig, PgTableStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
