//! # strata-federation
//!
//! The orchestration layer of the Strata federated metadata catalog.
//!
//! This crate sits between the durable entity store and the pluggable
//! catalog providers:
//!
//! - **Lock Manager**: In-process hierarchical path locks serializing
//!   mutations that touch the same namespace subtree
//! - **Federation Engine**: Per-level operations implementing the
//!   two-system protocol (local metadata record + remote provider
//!   side-effect) with compensation on failure
//! - **Maintenance**: Background purge of soft-deleted entities past
//!   their retention window
//! - **Metrics**: Operation counters and duration histograms
//!
//! The engine is the single writer path: REST handlers never touch the
//! store or a provider directly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod lock;
pub mod maintenance;
pub mod metrics;

pub use engine::{EngineConfig, FederationEngine};
pub use lock::{PathLockGuard, PathLockManager};
pub use maintenance::spawn_maintenance;
