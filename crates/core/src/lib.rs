//! # Obs Core
//!
//! Core business logic for the observation record service.
//!
//! This crate contains the domain model, the record store contract, and the
//! resource controller:
//! - Observation records with void-and-supersede versioning
//! - Representation-scoped rendering (`default` / `full` views)
//! - An in-memory record store implementing the collaborator contract
//!
//! **No API concerns**: HTTP servers, routing and OpenAPI documentation
//! belong in `api-rest`.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod model;
pub mod payload;
pub mod representation;
pub mod service;
pub mod store;
pub mod views;

pub use config::CoreConfig;
pub use error::{ErrorKind, ObsError, ObsResult};
pub use model::{AuditInfo, Concept, ConceptDatatype, Location, Obs, ObsState, ObsValue, Person};
pub use payload::ObsPayload;
pub use representation::Representation;
pub use service::ObsService;
pub use store::{InMemoryObsStore, ObsStore};
pub use views::{ObsView, RefStub, RefView};
