//! # strata-core
//!
//! Core abstractions for the Strata federated metadata catalog.
//!
//! This crate provides the foundational types used across all Strata
//! components:
//!
//! - **Namespace Model**: Validated name segments and hierarchical
//!   identifiers (metalake → catalog → schema → object)
//! - **Entity Model**: The versioned, audited metadata entity envelope with
//!   kind-specific payloads
//! - **Error Types**: The shared error taxonomy with stable kind tags
//! - **Observability**: Structured logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `strata-core` is the **only** crate allowed to define shared primitives.
//! All cross-component interaction happens via the types defined here.
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let ident = EntityIdent::schema_of("prod", "warehouse", "sales").unwrap();
//! assert_eq!(ident.depth(), 2);
//! assert_eq!(ident.kind(), EntityKind::Schema);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod entity;
pub mod error;
pub mod ident;
pub mod name;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audit::AuditInfo;
    pub use crate::entity::{
        Entity, EntityChange, EntityId, EntityKind, EntityPayload, EntityState, ObjectKind,
    };
    pub use crate::error::{Error, PartialFailureDetail, Result};
    pub use crate::ident::{EntityIdent, Namespace};
    pub use crate::name::Name;
}

// Re-export key types at crate root for ergonomics
pub use audit::AuditInfo;
pub use entity::{
    Entity, EntityChange, EntityId, EntityKind, EntityPayload, EntityState, ObjectKind,
};
pub use error::{Error, PartialFailureDetail, Result};
pub use ident::{EntityIdent, Namespace};
pub use name::Name;
pub use observability::{init_logging, LogFormat};
