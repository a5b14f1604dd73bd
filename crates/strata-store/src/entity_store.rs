//! The versioned entity store.
//!
//! Entities persist as JSON documents keyed by their dotted namespace path.
//! Every mutation is an optimistic-concurrency write: the caller states the
//! version it read (`ExpectedVersion::Exact`) or asserts the identifier is
//! unoccupied (`ExpectedVersion::Absent`), and the store commits the new
//! version atomically through the backend's compare-and-set facility.
//!
//! A soft-deleted entity keeps its identifier occupied until the retention
//! window elapses and [`EntityStore::purge_expired`] removes it; only then
//! can the identifier be reused (by a brand-new entity with a new id).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use strata_core::entity::{Entity, EntityState, INITIAL_VERSION};
use strata_core::error::{Error, Result};
use strata_core::ident::{EntityIdent, Namespace};

use crate::backend::{MetaBackend, WritePrecondition, WriteResult};

/// Default retention window for soft-deleted entities, in hours.
pub const DEFAULT_RETENTION_HOURS: i64 = 24 * 7;

/// Key prefix for entity documents.
const ENTITY_PREFIX: &str = "entities/";

/// The version a mutating call expects to find in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The identifier must be unoccupied (create).
    Absent,
    /// The stored version must equal this value (update).
    Exact(u64),
}

/// Contract for durable, versioned entity persistence.
///
/// Implementations must be safe to call from multiple processes against a
/// shared backend; single-key atomicity comes from the backend's CAS, not
/// from in-process exclusivity.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Loads an entity by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no record exists, or when the record
    /// is soft-deleted and `include_deleted` is false.
    async fn get(&self, ident: &EntityIdent, include_deleted: bool) -> Result<Entity>;

    /// Creates or updates an entity.
    ///
    /// With [`ExpectedVersion::Absent`] the entity is created at version 1.
    /// With [`ExpectedVersion::Exact`] the stored entity is replaced and the
    /// version advanced to `expected + 1`, atomically with the payload.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyExists`] when creating over an occupied identifier
    ///   (including one held by a soft-deleted record)
    /// - [`Error::VersionConflict`] when the stored version differs from the
    ///   expected one; the stored entity is left unchanged
    /// - [`Error::NotFound`] when updating an absent or deleted record
    async fn put(&self, entity: Entity, expected: ExpectedVersion) -> Result<Entity>;

    /// Marks an entity DELETED, bumping its version and stamping the delete
    /// time and the deleting principal on the audit trail. The record is
    /// retained until the purge window elapses.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`EntityStore::put`] for `Exact` expectations.
    async fn soft_delete(
        &self,
        ident: &EntityIdent,
        expected: ExpectedVersion,
        principal: &str,
    ) -> Result<Entity>;

    /// Moves an entity to a new identifier under the same namespace,
    /// preserving its id and advancing its version.
    ///
    /// The two keys cannot change atomically through the CAS seam; callers
    /// serialize renames per path (the engine's lock manager does this) and
    /// the new key is written before the old one is removed, so the entity
    /// is never unreachable.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] when the target identifier is occupied, plus
    /// the [`EntityStore::put`] taxonomy.
    async fn rename(
        &self,
        from: &EntityIdent,
        entity: Entity,
        expected: ExpectedVersion,
    ) -> Result<Entity>;

    /// Lists direct children of a namespace.
    ///
    /// Insertion order is not guaranteed; callers sort if order matters.
    async fn list(&self, namespace: &Namespace, include_deleted: bool) -> Result<Vec<Entity>>;

    /// Physically removes soft-deleted entities whose retention has elapsed.
    ///
    /// Invoked by background maintenance, never by the request path.
    /// Returns the number of purged records.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// [`EntityStore`] implementation over any [`MetaBackend`].
pub struct KvEntityStore {
    backend: Arc<dyn MetaBackend>,
    retention: Duration,
}

impl KvEntityStore {
    /// Creates a store with the default retention window.
    #[must_use]
    pub fn new(backend: Arc<dyn MetaBackend>) -> Self {
        Self::with_retention(backend, Duration::hours(DEFAULT_RETENTION_HOURS))
    }

    /// Creates a store with an explicit retention window.
    #[must_use]
    pub fn with_retention(backend: Arc<dyn MetaBackend>, retention: Duration) -> Self {
        Self { backend, retention }
    }

    fn key(ident: &EntityIdent) -> String {
        let mut key = String::from(ENTITY_PREFIX);
        for level in ident.namespace.levels() {
            key.push_str(level.as_str());
            key.push('/');
        }
        key.push_str(ident.name.as_str());
        key
    }

    fn children_prefix(namespace: &Namespace) -> String {
        let mut prefix = String::from(ENTITY_PREFIX);
        for level in namespace.levels() {
            prefix.push_str(level.as_str());
            prefix.push('/');
        }
        prefix
    }

    fn decode(ident: &EntityIdent, data: &Bytes) -> Result<Entity> {
        serde_json::from_slice(data).map_err(|e| {
            Error::serialization(format!("corrupt entity record for '{ident}': {e}"))
        })
    }

    fn encode(entity: &Entity) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(entity)?))
    }

    /// Reads the raw record plus its CAS token; `None` when absent.
    async fn read(&self, ident: &EntityIdent) -> Result<Option<(Entity, String)>> {
        match self.backend.get(&Self::key(ident)).await? {
            Some(value) => {
                let entity = Self::decode(ident, &value.data)?;
                Ok(Some((entity, value.token)))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, mut entity: Entity) -> Result<Entity> {
        entity.version = INITIAL_VERSION;
        entity.state = EntityState::Active;
        let key = Self::key(&entity.ident);
        let data = Self::encode(&entity)?;

        match self
            .backend
            .put(&key, data, WritePrecondition::DoesNotExist)
            .await?
        {
            WriteResult::Success { .. } => Ok(entity),
            WriteResult::PreconditionFailed { .. } => {
                // Shape the message by what occupies the slot.
                let occupied_by_deleted = matches!(
                    self.read(&entity.ident).await?,
                    Some((existing, _)) if !existing.is_active()
                );
                if occupied_by_deleted {
                    Err(Error::already_exists(format!(
                        "'{}' is held by a deleted entity awaiting purge",
                        entity.ident
                    )))
                } else {
                    Err(Error::already_exists(format!("'{}' already exists", entity.ident)))
                }
            }
        }
    }

    /// Shared update path for put/soft-delete/rename: validates the expected
    /// version against the stored record and commits via CAS.
    async fn update_at(
        &self,
        from: &EntityIdent,
        expected: u64,
        make: impl FnOnce(&Entity) -> Entity,
    ) -> Result<Entity> {
        let Some((current, token)) = self.read(from).await? else {
            return Err(Error::not_found(format!("'{from}' does not exist")));
        };
        if !current.is_active() {
            return Err(Error::not_found(format!("'{from}' is deleted")));
        }
        if current.version != expected {
            return Err(Error::VersionConflict {
                ident: from.to_string(),
                expected,
                actual: current.version,
            });
        }

        let mut next = make(&current);
        next.version = expected + 1;
        let renamed = next.ident != *from;
        let data = Self::encode(&next)?;

        if renamed {
            let new_key = Self::key(&next.ident);
            match self
                .backend
                .put(&new_key, data, WritePrecondition::DoesNotExist)
                .await?
            {
                WriteResult::Success { .. } => {}
                WriteResult::PreconditionFailed { .. } => {
                    return Err(Error::already_exists(format!(
                        "'{}' already exists",
                        next.ident
                    )));
                }
            }
            self.backend.delete(&Self::key(from)).await?;
            return Ok(next);
        }

        match self
            .backend
            .put(&Self::key(from), data, WritePrecondition::MatchesToken(token))
            .await?
        {
            WriteResult::Success { .. } => Ok(next),
            WriteResult::PreconditionFailed { .. } => {
                // Another process won the race between our read and write.
                // The store's CAS, not the in-process lock, is the final
                // arbiter, so report the conflict from a fresh read.
                let actual = match self.read(from).await? {
                    Some((entity, _)) => entity.version,
                    None => {
                        return Err(Error::not_found(format!("'{from}' does not exist")));
                    }
                };
                Err(Error::VersionConflict {
                    ident: from.to_string(),
                    expected,
                    actual,
                })
            }
        }
    }
}

#[async_trait]
impl EntityStore for KvEntityStore {
    async fn get(&self, ident: &EntityIdent, include_deleted: bool) -> Result<Entity> {
        match self.read(ident).await? {
            Some((entity, _)) if entity.is_active() || include_deleted => Ok(entity),
            _ => Err(Error::not_found(format!("'{ident}' does not exist"))),
        }
    }

    async fn put(&self, entity: Entity, expected: ExpectedVersion) -> Result<Entity> {
        match expected {
            ExpectedVersion::Absent => self.create(entity).await,
            ExpectedVersion::Exact(version) => {
                let ident = entity.ident.clone();
                self.update_at(&ident, version, |current| {
                    let mut next = entity.clone();
                    next.id = current.id;
                    next.state = current.state;
                    next
                })
                .await
            }
        }
    }

    async fn soft_delete(
        &self,
        ident: &EntityIdent,
        expected: ExpectedVersion,
        principal: &str,
    ) -> Result<Entity> {
        let ExpectedVersion::Exact(version) = expected else {
            return Err(Error::validation("soft delete requires an exact expected version"));
        };
        self.update_at(ident, version, |current| {
            let mut next = current.clone();
            next.state = EntityState::Deleted {
                deleted_at: Utc::now(),
            };
            next.audit.mark_modified(principal);
            next
        })
        .await
    }

    async fn rename(
        &self,
        from: &EntityIdent,
        entity: Entity,
        expected: ExpectedVersion,
    ) -> Result<Entity> {
        let ExpectedVersion::Exact(version) = expected else {
            return Err(Error::validation("rename requires an exact expected version"));
        };
        if entity.ident.namespace != from.namespace {
            return Err(Error::validation(
                "rename cannot move an entity across namespaces",
            ));
        }
        self.update_at(from, version, |current| {
            let mut next = entity.clone();
            next.id = current.id;
            next.state = current.state;
            next
        })
        .await
    }

    async fn list(&self, namespace: &Namespace, include_deleted: bool) -> Result<Vec<Entity>> {
        let prefix = Self::children_prefix(namespace);
        let metas = self.backend.list(&prefix).await?;

        let mut entities = Vec::new();
        for meta in metas {
            // Direct children only: no further path separator past the prefix.
            let remainder = &meta.key[prefix.len()..];
            if remainder.is_empty() || remainder.contains('/') {
                continue;
            }
            let Some(value) = self.backend.get(&meta.key).await? else {
                // Purged between list and get.
                continue;
            };
            let entity: Entity = serde_json::from_slice(&value.data).map_err(|e| {
                Error::serialization(format!("corrupt entity record at '{}': {e}", meta.key))
            })?;
            if entity.is_active() || include_deleted {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let metas = self.backend.list(ENTITY_PREFIX).await?;
        let mut purged = 0;

        for meta in metas {
            let Some(value) = self.backend.get(&meta.key).await? else {
                continue;
            };
            let entity: Entity = match serde_json::from_slice(&value.data) {
                Ok(entity) => entity,
                Err(e) => {
                    tracing::warn!(key = %meta.key, error = %e, "Skipping corrupt entity record during purge");
                    continue;
                }
            };
            let EntityState::Deleted { deleted_at } = entity.state else {
                continue;
            };
            if deleted_at + self.retention <= now {
                self.backend.delete(&meta.key).await?;
                tracing::info!(ident = %entity.ident, "Purged expired deleted entity");
                purged += 1;
            }
        }
        Ok(purged)
    }
}
