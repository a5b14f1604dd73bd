//! The versioned, audited metadata entity model.
//!
//! All entity kinds (metalake, catalog, schema, object) share one envelope —
//! surrogate id, identifier, properties, audit info, version, state — and
//! differ only in a kind-specific payload, dispatched by exhaustive matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::audit::AuditInfo;
use crate::error::{Error, Result};
use crate::ident::EntityIdent;
use crate::name::Name;

/// The version assigned to a freshly created entity.
pub const INITIAL_VERSION: u64 = 1;

/// Surrogate key for an entity, stable for its lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Ulid);

impl EntityId {
    /// Generates a new globally unique entity id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid entity id '{s}': {e}")))
    }
}

/// The kind of entity an identifier addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Top-level tenant boundary.
    Metalake,
    /// Provider-bound federation root.
    Catalog,
    /// Schema within a catalog.
    Schema,
    /// Provider-native leaf unit (table, fileset, topic).
    Object,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Metalake => "metalake",
            Self::Catalog => "catalog",
            Self::Schema => "schema",
            Self::Object => "object",
        };
        write!(f, "{s}")
    }
}

/// The provider-native unit an object represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Relational table.
    Table,
    /// File-set rooted in a distributed filesystem.
    Fileset,
    /// Messaging topic.
    Topic,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Table => "table",
            Self::Fileset => "fileset",
            Self::Topic => "topic",
        };
        write!(f, "{s}")
    }
}

/// Kind-specific payload carried inside the shared entity envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPayload {
    /// Metalake payload.
    Metalake {
        /// Optional description.
        comment: Option<String>,
    },
    /// Catalog payload.
    Catalog {
        /// Provider type string the catalog is bound to.
        provider_type: String,
        /// Optional description.
        comment: Option<String>,
    },
    /// Schema payload.
    Schema {
        /// Optional description.
        comment: Option<String>,
    },
    /// Object payload.
    Object {
        /// The provider-native unit kind.
        object_kind: ObjectKind,
        /// Optional description.
        comment: Option<String>,
    },
}

impl EntityPayload {
    /// Returns the entity kind this payload represents.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Metalake { .. } => EntityKind::Metalake,
            Self::Catalog { .. } => EntityKind::Catalog,
            Self::Schema { .. } => EntityKind::Schema,
            Self::Object { .. } => EntityKind::Object,
        }
    }

    /// Returns the payload comment, if any.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        match self {
            Self::Metalake { comment }
            | Self::Catalog { comment, .. }
            | Self::Schema { comment }
            | Self::Object { comment, .. } => comment.as_deref(),
        }
    }

    fn set_comment(&mut self, new_comment: Option<String>) {
        match self {
            Self::Metalake { comment }
            | Self::Catalog { comment, .. }
            | Self::Schema { comment }
            | Self::Object { comment, .. } => *comment = new_comment,
        }
    }
}

/// Lifecycle state of an entity.
///
/// One-directional: ACTIVE → DELETED → purged. There is no undelete;
/// recreating a purged identifier mints a brand-new entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntityState {
    /// The entity is live and addressable.
    Active,
    /// The entity is soft-deleted, retained for a purge window.
    Deleted {
        /// When the soft delete happened.
        deleted_at: DateTime<Utc>,
    },
}

impl EntityState {
    /// Returns true for the ACTIVE state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A versioned, audited metadata entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Surrogate key, stable for the entity's lifetime.
    pub id: EntityId,
    /// Namespace path plus name; mutable only via an explicit rename.
    pub ident: EntityIdent,
    /// Kind-specific payload.
    pub payload: EntityPayload,
    /// Provider- and kind-specific string properties, opaque to the core.
    pub properties: BTreeMap<String, String>,
    /// Creator/modifier stamps.
    pub audit: AuditInfo,
    /// Monotonically increasing version, starting at [`INITIAL_VERSION`].
    pub version: u64,
    /// Lifecycle state.
    pub state: EntityState,
}

impl Entity {
    /// Creates a new ACTIVE entity at [`INITIAL_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the identifier depth does not
    /// match the payload kind.
    pub fn new(
        ident: EntityIdent,
        payload: EntityPayload,
        properties: BTreeMap<String, String>,
        audit: AuditInfo,
    ) -> Result<Self> {
        if ident.kind() != payload.kind() {
            return Err(Error::validation(format!(
                "identifier '{ident}' addresses a {} but payload is a {}",
                ident.kind(),
                payload.kind()
            )));
        }
        Ok(Self {
            id: EntityId::generate(),
            ident,
            payload,
            properties,
            audit,
            version: INITIAL_VERSION,
            state: EntityState::Active,
        })
    }

    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Returns true when the entity is ACTIVE.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Applies a sequence of changes in order, stamping the modifier.
    ///
    /// Returns the changed entity; the version is left untouched (the store
    /// assigns the next version on a successful put).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed changes.
    pub fn apply_changes(&self, changes: &[EntityChange], principal: &str) -> Result<Self> {
        let mut entity = self.clone();
        for change in changes {
            match change {
                EntityChange::SetProperty { key, value } => {
                    if key.is_empty() {
                        return Err(Error::validation("property key cannot be empty"));
                    }
                    entity.properties.insert(key.clone(), value.clone());
                }
                EntityChange::RemoveProperty { key } => {
                    entity.properties.remove(key);
                }
                EntityChange::UpdateComment { comment } => {
                    entity.payload.set_comment(comment.clone());
                }
                EntityChange::Rename { new_name } => {
                    entity.ident = entity.ident.with_name(new_name.clone());
                }
            }
        }
        entity.audit.mark_modified(principal);
        Ok(entity)
    }
}

/// A single alteration applied to an entity.
///
/// Changes are applied by exhaustive matching; a rename preserves the
/// surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityChange {
    /// Sets (or overwrites) a property.
    SetProperty {
        /// Property key.
        key: String,
        /// Property value.
        value: String,
    },
    /// Removes a property if present.
    RemoveProperty {
        /// Property key.
        key: String,
    },
    /// Replaces the comment.
    UpdateComment {
        /// New comment, or `None` to clear it.
        comment: Option<String>,
    },
    /// Renames the entity, preserving its id.
    Rename {
        /// The new leaf name.
        new_name: Name,
    },
}

impl EntityChange {
    /// Returns true when the change alters the entity's identifier.
    #[must_use]
    pub fn is_rename(&self) -> bool {
        matches!(self, Self::Rename { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_entity() -> Entity {
        Entity::new(
            EntityIdent::schema_of("t1", "c1", "s1").unwrap(),
            EntityPayload::Schema { comment: None },
            BTreeMap::new(),
            AuditInfo::new("alice"),
        )
        .unwrap()
    }

    #[test]
    fn new_entity_starts_active_at_version_one() {
        let entity = schema_entity();
        assert_eq!(entity.version, INITIAL_VERSION);
        assert!(entity.is_active());
        assert_eq!(entity.kind(), EntityKind::Schema);
    }

    #[test]
    fn kind_mismatch_rejected() {
        let result = Entity::new(
            EntityIdent::metalake_of("t1").unwrap(),
            EntityPayload::Schema { comment: None },
            BTreeMap::new(),
            AuditInfo::new("alice"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn apply_property_changes() {
        let entity = schema_entity();
        let changed = entity
            .apply_changes(
                &[
                    EntityChange::SetProperty {
                        key: "owner".into(),
                        value: "data-eng".into(),
                    },
                    EntityChange::UpdateComment {
                        comment: Some("sales schema".into()),
                    },
                ],
                "bob",
            )
            .unwrap();

        assert_eq!(changed.properties.get("owner").map(String::as_str), Some("data-eng"));
        assert_eq!(changed.payload.comment(), Some("sales schema"));
        assert_eq!(changed.audit.last_modifier.as_deref(), Some("bob"));
        // The store assigns the next version; apply_changes must not.
        assert_eq!(changed.version, entity.version);
    }

    #[test]
    fn rename_preserves_id() {
        let entity = schema_entity();
        let renamed = entity
            .apply_changes(
                &[EntityChange::Rename {
                    new_name: Name::new("s2").unwrap(),
                }],
                "bob",
            )
            .unwrap();
        assert_eq!(renamed.id, entity.id);
        assert_eq!(renamed.ident.to_string(), "t1.c1.s2");
    }

    #[test]
    fn entity_serde_roundtrip() {
        let entity = schema_entity();
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }
}
