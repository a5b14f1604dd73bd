//! # strata-provider
//!
//! The pluggable catalog-provider abstraction for Strata.
//!
//! A provider adapts the core's object model into operations against one
//! class of external system (relational warehouse, distributed filesystem,
//! message broker). This crate defines:
//!
//! - [`CatalogProvider`]: the capability surface every provider implements;
//!   unimplemented capabilities report [`ProviderError::NotSupported`]
//! - [`ProviderFactory`]: compile-time-checked construction from a provider
//!   type string plus a property-bag configuration — an explicit registry
//!   entry, not runtime reflection
//! - [`ProviderRegistry`]: resolves type strings to factories and caches
//!   exactly one provider instance per live catalog
//! - [`MemoryCatalogProvider`]: the in-memory reference provider, registered
//!   under the `memory` and `mock` type strings
//!
//! Providers are loadable and unloadable without restarting the service: the
//! registry binds an instance when a catalog is created (or first used after
//! startup) and tears it down when the catalog is dropped.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod provider;
pub mod registry;

pub use error::{ProviderError, ProviderResult};
pub use memory::{MemoryCatalogProvider, MemoryProviderFactory};
pub use provider::{CatalogContext, CatalogProvider, ObjectSummary, ProviderFactory};
pub use registry::ProviderRegistry;
