//! # strata-store
//!
//! Durable, versioned persistence of metadata entities for Strata.
//!
//! Two layers:
//!
//! - [`MetaBackend`]: a compare-and-set key-value contract the durable
//!   backend must satisfy. Writes to a single key are serialized by the
//!   backend's own atomicity, so the store is safe to use from multiple
//!   service processes against shared storage. A relational or transactional
//!   KV system implements this seam; [`MemoryBackend`] is the in-process
//!   implementation for development and tests.
//! - [`EntityStore`]: the entity contract — optimistic-version `put`,
//!   soft delete with a retention window, child listing, and purge of
//!   expired deleted records. [`KvEntityStore`] implements it over any
//!   `MetaBackend`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_store::{KvEntityStore, MemoryBackend, ExpectedVersion};
//!
//! let store = KvEntityStore::new(Arc::new(MemoryBackend::new()), retention);
//! let created = store.put(entity, ExpectedVersion::Absent).await?;
//! assert_eq!(created.version, 1);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod entity_store;

pub use backend::{MemoryBackend, MetaBackend, ValueMeta, VersionedValue, WritePrecondition, WriteResult};
pub use entity_store::{EntityStore, ExpectedVersion, KvEntityStore, DEFAULT_RETENTION_HOURS};
