//! # API REST
//!
//! REST API implementation for the observation record service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS)
//!
//! The domain semantics live in `obs-core`.

#![warn(rust_2018_idioms)]

pub use obs_core::ObsService;
