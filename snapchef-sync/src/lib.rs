//! Device-side sync engine for shared recipes, photo assets, likes and
//! follows.
//!
//! The engine keeps a device-authoritative cache in front of an eventually
//! consistent remote document store with a partially known schema and
//! ownership-scoped writes. Mutations apply locally first and reconcile
//! asynchronously: like toggles are optimistic with rollback, pushes retry
//! transient failures with bounded backoff, and schema fields a deployment
//! cannot take are learned once and skipped thereafter.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod executor;
pub mod identity;
pub mod remote;
pub mod services;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
