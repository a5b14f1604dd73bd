//! The federation engine.
//!
//! Single writer path for the whole system: every mutation flows
//! validate → lock → store-read → provider → store-write → unlock. The
//! engine owns the two-system protocol between the durable entity store
//! and the remote catalog providers:
//!
//! - **Creates** touch the remote first, then write the local record; a
//!   local write failure triggers one compensating remote drop. If the
//!   compensation fails too, the operation surfaces a `PartialFailure`
//!   naming which side committed.
//! - **Drops** soft-delete the local record first, then drop on the
//!   remote; a remote failure leaves the record DELETED (never
//!   resurrected) and surfaces a `PartialFailure`.
//! - **Alters** are optimistic: read a version, apply remotely, write
//!   locally conditioned on that version. A conflict fails the whole
//!   operation; the caller retries from a fresh read.
//!
//! Every provider call is bounded by the configured deadline; an elapsed
//! deadline means the remote outcome is unknown and is surfaced as a
//! retryable timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use strata_core::audit::AuditInfo;
use strata_core::entity::{Entity, EntityChange, EntityKind, EntityPayload, ObjectKind};
use strata_core::error::{Error, PartialFailureDetail, Result};
use strata_core::ident::{EntityIdent, Namespace};
use strata_core::name::Name;
use strata_provider::{
    CatalogContext, CatalogProvider, ObjectSummary, ProviderRegistry, ProviderResult,
};
use strata_store::{EntityStore, ExpectedVersion};

use crate::lock::PathLockManager;
use crate::metrics;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for acquiring a path lock.
    pub lock_wait: Duration,
    /// Deadline applied to every provider call.
    pub provider_deadline: Duration,
    /// Interval between background purge runs.
    pub purge_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(5),
            provider_deadline: Duration::from_secs(10),
            purge_interval: Duration::from_secs(300),
        }
    }
}

/// Which remote call an alter carries alongside the local write.
enum RemoteSide {
    None,
    Schema,
    Object,
}

/// Orchestrates the entity store, the path locks, and the provider
/// registry.
pub struct FederationEngine {
    store: Arc<dyn EntityStore>,
    registry: Arc<ProviderRegistry>,
    locks: PathLockManager,
    config: EngineConfig,
}

impl FederationEngine {
    /// Creates an engine with default tuning.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self::with_config(store, registry, EngineConfig::default())
    }

    /// Creates an engine with explicit tuning.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn EntityStore>,
        registry: Arc<ProviderRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            locks: PathLockManager::new(),
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Metalake operations (store-only; metalakes have no provider side)
    // ------------------------------------------------------------------

    /// Creates a metalake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the identifier is occupied,
    /// including by a soft-deleted record awaiting purge.
    pub async fn create_metalake(
        &self,
        ident: &EntityIdent,
        comment: Option<String>,
        properties: BTreeMap<String, String>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("create_metalake", async {
            Self::ensure_kind(ident, EntityKind::Metalake)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            let entity = Entity::new(
                ident.clone(),
                EntityPayload::Metalake { comment },
                properties,
                AuditInfo::new(principal),
            )?;
            let created = self.store.put(entity, ExpectedVersion::Absent).await?;
            tracing::info!(ident = %ident, "Created metalake");
            Ok(created)
        })
        .await
    }

    /// Loads a metalake from the entity store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the metalake does not exist, or is
    /// soft-deleted and `include_deleted` is false.
    pub async fn load_metalake(
        &self,
        ident: &EntityIdent,
        include_deleted: bool,
    ) -> Result<Entity> {
        Self::ensure_kind(ident, EntityKind::Metalake)?;
        self.store.get(ident, include_deleted).await
    }

    /// Lists all metalakes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a backend failure.
    pub async fn list_metalakes(&self, include_deleted: bool) -> Result<Vec<Entity>> {
        self.store.list(&Namespace::root(), include_deleted).await
    }

    /// Alters a metalake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionConflict`] when `expected_version` (or the
    /// version read under the lock) loses the optimistic race.
    pub async fn alter_metalake(
        &self,
        ident: &EntityIdent,
        changes: &[EntityChange],
        expected_version: Option<u64>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("alter_metalake", async {
            Self::ensure_kind(ident, EntityKind::Metalake)?;
            self.alter_entity(ident, changes, expected_version, principal, RemoteSide::None)
                .await
        })
        .await
    }

    /// Soft-deletes a metalake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the metalake still contains live
    /// catalogs.
    pub async fn drop_metalake(&self, ident: &EntityIdent, principal: &str) -> Result<Entity> {
        Self::observed("drop_metalake", async {
            Self::ensure_kind(ident, EntityKind::Metalake)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            let current = self.store.get(ident, false).await?;
            self.ensure_no_live_children(ident).await?;
            let deleted = self
                .store
                .soft_delete(ident, ExpectedVersion::Exact(current.version), principal)
                .await?;
            tracing::info!(ident = %ident, principal, "Dropped metalake");
            Ok(deleted)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Catalog operations
    // ------------------------------------------------------------------

    /// Creates a catalog bound to a provider.
    ///
    /// Probes the remote with `test_connection` before anything is
    /// persisted; any failure after the provider is instantiated unbinds
    /// it again, so a failed create leaves no trace.
    ///
    /// # Errors
    ///
    /// - [`Error::NotSupported`] when no factory serves `provider_type`
    /// - [`Error::RemoteUnavailable`] / [`Error::Timeout`] when the probe
    ///   fails
    /// - [`Error::AlreadyExists`] when the identifier is occupied
    pub async fn create_catalog(
        &self,
        ident: &EntityIdent,
        provider_type: &str,
        comment: Option<String>,
        properties: BTreeMap<String, String>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("create_catalog", async {
            Self::ensure_kind(ident, EntityKind::Catalog)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            self.ensure_parent_active(ident).await?;
            self.ensure_slot_free(ident).await?;

            let context = CatalogContext {
                catalog: ident.clone(),
                properties: properties.clone(),
            };
            let provider = self.registry.bind(provider_type, context)?;

            if let Err(err) = self
                .with_deadline("test_connection", provider.test_connection())
                .await
            {
                if let Err(unbind_err) = self.registry.unbind(ident).await {
                    tracing::warn!(ident = %ident, error = %unbind_err, "Unbind after failed probe reported an error");
                }
                tracing::warn!(ident = %ident, error = %err, "Catalog connection probe failed");
                return Err(err);
            }

            let entity = Entity::new(
                ident.clone(),
                EntityPayload::Catalog {
                    provider_type: provider_type.to_string(),
                    comment,
                },
                properties,
                AuditInfo::new(principal),
            )?;
            match self.store.put(entity, ExpectedVersion::Absent).await {
                Ok(created) => {
                    tracing::info!(ident = %ident, provider_type, "Created catalog");
                    Ok(created)
                }
                Err(err) => {
                    // The put failure is the caller's error; a broken unbind
                    // must not displace it.
                    if let Err(unbind_err) = self.registry.unbind(ident).await {
                        tracing::warn!(ident = %ident, error = %unbind_err, "Unbind after failed catalog write reported an error");
                    }
                    Err(err)
                }
            }
        })
        .await
    }

    /// Probes a provider configuration without creating anything.
    ///
    /// # Errors
    ///
    /// Propagates the probe failure; [`Error::NotSupported`] when no
    /// factory serves `provider_type`.
    pub async fn test_catalog_connection(
        &self,
        ident: &EntityIdent,
        provider_type: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<()> {
        Self::ensure_kind(ident, EntityKind::Catalog)?;
        let provider = self.registry.create_unbound(
            provider_type,
            CatalogContext {
                catalog: ident.clone(),
                properties,
            },
        )?;
        let probe = self
            .with_deadline("test_connection", provider.test_connection())
            .await;
        if let Err(err) = provider.shutdown().await {
            tracing::warn!(ident = %ident, error = %err, "Probe provider shutdown reported an error");
        }
        probe
    }

    /// Loads a catalog from the entity store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when absent (or deleted and not asked
    /// for).
    pub async fn load_catalog(&self, ident: &EntityIdent, include_deleted: bool) -> Result<Entity> {
        Self::ensure_kind(ident, EntityKind::Catalog)?;
        self.store.get(ident, include_deleted).await
    }

    /// Lists the catalogs of a metalake from the entity store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the metalake does not exist.
    pub async fn list_catalogs(
        &self,
        metalake: &EntityIdent,
        include_deleted: bool,
    ) -> Result<Vec<Entity>> {
        Self::ensure_kind(metalake, EntityKind::Metalake)?;
        self.store.get(metalake, false).await?;
        self.store
            .list(&metalake.as_child_namespace()?, include_deleted)
            .await
    }

    /// Alters a catalog. The catalog record is local metadata; the bound
    /// provider is not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionConflict`] on an optimistic race.
    pub async fn alter_catalog(
        &self,
        ident: &EntityIdent,
        changes: &[EntityChange],
        expected_version: Option<u64>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("alter_catalog", async {
            Self::ensure_kind(ident, EntityKind::Catalog)?;
            let altered = self
                .alter_entity(ident, changes, expected_version, principal, RemoteSide::None)
                .await?;
            if changes.iter().any(EntityChange::is_rename) {
                // The binding is keyed by identifier; drop it and let the
                // next use rebind lazily under the new name.
                self.registry.unbind(ident).await?;
            }
            Ok(altered)
        })
        .await
    }

    /// Soft-deletes a catalog and tears down its provider binding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the catalog still contains live
    /// schemas.
    pub async fn drop_catalog(&self, ident: &EntityIdent, principal: &str) -> Result<Entity> {
        Self::observed("drop_catalog", async {
            Self::ensure_kind(ident, EntityKind::Catalog)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            let current = self.store.get(ident, false).await?;
            self.ensure_no_live_children(ident).await?;
            let deleted = self
                .store
                .soft_delete(ident, ExpectedVersion::Exact(current.version), principal)
                .await?;
            self.registry.unbind(ident).await?;
            tracing::info!(ident = %ident, principal, "Dropped catalog");
            Ok(deleted)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Schema operations
    // ------------------------------------------------------------------

    /// Creates a schema: remote first, then the local record, with one
    /// compensating remote drop if the local write fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialFailure`] when the compensation fails too
    /// and the remote may hold a schema with no local record.
    pub async fn create_schema(
        &self,
        ident: &EntityIdent,
        comment: Option<String>,
        properties: BTreeMap<String, String>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("create_schema", async {
            Self::ensure_kind(ident, EntityKind::Schema)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            self.ensure_parent_active(ident).await?;
            self.ensure_slot_free(ident).await?;
            let provider = self.provider_for(ident).await?;

            self.with_deadline(
                "create_schema",
                provider.create_schema(ident, comment.as_deref(), &properties),
            )
            .await?;

            let entity = Entity::new(
                ident.clone(),
                EntityPayload::Schema { comment },
                properties,
                AuditInfo::new(principal),
            )?;
            match self.store.put(entity, ExpectedVersion::Absent).await {
                Ok(created) => {
                    tracing::info!(ident = %ident, "Created schema");
                    Ok(created)
                }
                Err(put_err) => {
                    self.compensate_create(
                        ident,
                        "create_schema",
                        put_err,
                        self.with_deadline("drop_schema", provider.drop_schema(ident)),
                    )
                    .await
                }
            }
        })
        .await
    }

    /// Lists schema names from the live provider (remote truth).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the catalog does not exist, or a
    /// remote error from the provider.
    pub async fn list_schemas(&self, catalog: &EntityIdent) -> Result<Vec<Name>> {
        Self::ensure_kind(catalog, EntityKind::Catalog)?;
        let provider = self.resolve_or_bind(catalog).await?;
        self.with_deadline("list_schemas", provider.list_schemas())
            .await
    }

    /// Loads a schema from the entity store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when absent (or deleted and not asked
    /// for).
    pub async fn load_schema(&self, ident: &EntityIdent, include_deleted: bool) -> Result<Entity> {
        Self::ensure_kind(ident, EntityKind::Schema)?;
        self.store.get(ident, include_deleted).await
    }

    /// Alters a schema on both sides: remote alter, then conditional local
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionConflict`] on an optimistic race; the
    /// caller retries from a fresh read.
    pub async fn alter_schema(
        &self,
        ident: &EntityIdent,
        changes: &[EntityChange],
        expected_version: Option<u64>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("alter_schema", async {
            Self::ensure_kind(ident, EntityKind::Schema)?;
            self.alter_entity(ident, changes, expected_version, principal, RemoteSide::Schema)
                .await
        })
        .await
    }

    /// Drops a schema: local soft-delete first, then the remote drop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialFailure`] when the remote drop fails; the
    /// local record stays DELETED and is never resurrected.
    pub async fn drop_schema(&self, ident: &EntityIdent, principal: &str) -> Result<Entity> {
        Self::observed("drop_schema", async {
            Self::ensure_kind(ident, EntityKind::Schema)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            let current = self.store.get(ident, false).await?;
            self.ensure_no_live_children(ident).await?;
            let provider = self.provider_for(ident).await?;

            let deleted = self
                .store
                .soft_delete(ident, ExpectedVersion::Exact(current.version), principal)
                .await?;
            match self
                .with_deadline("drop_schema", provider.drop_schema(ident))
                .await
            {
                Ok(()) => {
                    tracing::info!(ident = %ident, principal, "Dropped schema");
                    Ok(deleted)
                }
                Err(err) => Err(Self::drop_partial_failure(ident, "drop_schema", &err)),
            }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Object operations
    // ------------------------------------------------------------------

    /// Creates an object (table, fileset, or topic): remote first, then
    /// the local record, with one compensating remote drop on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialFailure`] when the compensation fails too.
    pub async fn create_object(
        &self,
        ident: &EntityIdent,
        kind: ObjectKind,
        comment: Option<String>,
        properties: BTreeMap<String, String>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("create_object", async {
            Self::ensure_kind(ident, EntityKind::Object)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            self.ensure_parent_active(ident).await?;
            self.ensure_slot_free(ident).await?;
            let provider = self.provider_for(ident).await?;

            self.with_deadline(
                "create_object",
                provider.create_object(ident, kind, comment.as_deref(), &properties),
            )
            .await?;

            let entity = Entity::new(
                ident.clone(),
                EntityPayload::Object {
                    object_kind: kind,
                    comment,
                },
                properties,
                AuditInfo::new(principal),
            )?;
            match self.store.put(entity, ExpectedVersion::Absent).await {
                Ok(created) => {
                    tracing::info!(ident = %ident, object_kind = %kind, "Created object");
                    Ok(created)
                }
                Err(put_err) => {
                    self.compensate_create(
                        ident,
                        "create_object",
                        put_err,
                        self.with_deadline("drop_object", provider.drop_object(ident)),
                    )
                    .await
                }
            }
        })
        .await
    }

    /// Lists object names in a schema from the live provider (remote
    /// truth).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the schema does not exist, or a
    /// remote error from the provider.
    pub async fn list_objects(&self, schema: &EntityIdent) -> Result<Vec<Name>> {
        Self::ensure_kind(schema, EntityKind::Schema)?;
        self.store.get(schema, false).await?;
        let provider = self.provider_for(schema).await?;
        self.with_deadline("list_objects", provider.list_objects(schema))
            .await
    }

    /// Loads an object from the entity store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when absent (or deleted and not asked
    /// for).
    pub async fn load_object(&self, ident: &EntityIdent, include_deleted: bool) -> Result<Entity> {
        Self::ensure_kind(ident, EntityKind::Object)?;
        self.store.get(ident, include_deleted).await
    }

    /// Fetches live remote detail for an object from its provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no local record exists, or a
    /// remote error from the provider.
    pub async fn describe_object(&self, ident: &EntityIdent) -> Result<ObjectSummary> {
        Self::ensure_kind(ident, EntityKind::Object)?;
        self.store.get(ident, false).await?;
        let provider = self.provider_for(ident).await?;
        self.with_deadline("load_object", provider.load_object(ident))
            .await
    }

    /// Alters an object on both sides: remote alter, then conditional
    /// local write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionConflict`] on an optimistic race.
    pub async fn alter_object(
        &self,
        ident: &EntityIdent,
        changes: &[EntityChange],
        expected_version: Option<u64>,
        principal: &str,
    ) -> Result<Entity> {
        Self::observed("alter_object", async {
            Self::ensure_kind(ident, EntityKind::Object)?;
            self.alter_entity(ident, changes, expected_version, principal, RemoteSide::Object)
                .await
        })
        .await
    }

    /// Drops an object: local soft-delete first, then the remote drop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialFailure`] when the remote drop fails; the
    /// local record stays DELETED.
    pub async fn drop_object(&self, ident: &EntityIdent, principal: &str) -> Result<Entity> {
        Self::observed("drop_object", async {
            Self::ensure_kind(ident, EntityKind::Object)?;
            let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
            let current = self.store.get(ident, false).await?;
            let provider = self.provider_for(ident).await?;

            let deleted = self
                .store
                .soft_delete(ident, ExpectedVersion::Exact(current.version), principal)
                .await?;
            match self
                .with_deadline("drop_object", provider.drop_object(ident))
                .await
            {
                Ok(()) => {
                    tracing::info!(ident = %ident, principal, "Dropped object");
                    Ok(deleted)
                }
                Err(err) => Err(Self::drop_partial_failure(ident, "drop_object", &err)),
            }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Lifecycle and maintenance
    // ------------------------------------------------------------------

    /// Rebinds providers for every live catalog already in the store.
    ///
    /// Called once at startup. A catalog whose provider fails to bind is
    /// logged and skipped; it gets another chance on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the store cannot be listed.
    pub async fn rebind_catalogs(&self) -> Result<usize> {
        let mut bound = 0;
        for metalake in self.store.list(&Namespace::root(), false).await? {
            let namespace = metalake.ident.as_child_namespace()?;
            for catalog in self.store.list(&namespace, false).await? {
                let EntityPayload::Catalog { provider_type, .. } = &catalog.payload else {
                    continue;
                };
                if self.registry.resolve(&catalog.ident)?.is_some() {
                    continue;
                }
                let context = CatalogContext {
                    catalog: catalog.ident.clone(),
                    properties: catalog.properties.clone(),
                };
                match self.registry.bind(provider_type, context) {
                    Ok(_) => bound += 1,
                    Err(err) => {
                        tracing::warn!(
                            catalog = %catalog.ident,
                            error = %err,
                            "Failed to rebind catalog provider at startup"
                        );
                    }
                }
            }
        }
        tracing::info!(bound, "Rebound catalog providers");
        Ok(bound)
    }

    /// Purges soft-deleted entities whose retention has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a backend failure.
    pub async fn run_purge(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            metrics::record_purge(u64::try_from(purged).unwrap_or(u64::MAX));
            tracing::info!(purged, "Purged expired entities");
        }
        Ok(purged)
    }

    /// Tears down every provider binding. Called at process shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry state is poisoned.
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_kind(ident: &EntityIdent, kind: EntityKind) -> Result<()> {
        if ident.kind() == kind {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "'{ident}' does not address a {kind}"
            )))
        }
    }

    async fn ensure_parent_active(&self, ident: &EntityIdent) -> Result<Entity> {
        let parent = ident
            .parent()
            .ok_or_else(|| Error::validation(format!("'{ident}' has no parent")))?;
        self.store.get(&parent, false).await.map_err(|err| match err {
            Error::NotFound { .. } => {
                Error::not_found(format!("parent '{parent}' of '{ident}' does not exist"))
            }
            other => other,
        })
    }

    /// Rejects a create whose identifier is occupied, before the remote is
    /// touched. A DELETED record holds the slot until purge.
    async fn ensure_slot_free(&self, ident: &EntityIdent) -> Result<()> {
        match self.store.get(ident, true).await {
            Ok(existing) if existing.is_active() => Err(Error::already_exists(format!(
                "'{ident}' already exists"
            ))),
            Ok(_) => Err(Error::already_exists(format!(
                "'{ident}' is soft-deleted and held until its retention elapses"
            ))),
            Err(Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn ensure_no_live_children(&self, ident: &EntityIdent) -> Result<()> {
        let namespace = ident.as_child_namespace()?;
        let children = self.store.list(&namespace, false).await?;
        if children.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "'{ident}' still contains {} live child entities; drop them first",
                children.len()
            )))
        }
    }

    async fn provider_for(&self, ident: &EntityIdent) -> Result<Arc<dyn CatalogProvider>> {
        let catalog = ident
            .catalog()
            .ok_or_else(|| Error::validation(format!("'{ident}' is not inside a catalog")))?;
        self.resolve_or_bind(&catalog).await
    }

    /// Returns the provider bound to a catalog, binding it lazily from the
    /// stored catalog entity when the cache is cold (e.g. after restart).
    async fn resolve_or_bind(&self, catalog: &EntityIdent) -> Result<Arc<dyn CatalogProvider>> {
        if let Some(provider) = self.registry.resolve(catalog)? {
            return Ok(provider);
        }
        let entity = self.store.get(catalog, false).await?;
        let EntityPayload::Catalog { provider_type, .. } = &entity.payload else {
            return Err(Error::internal(format!(
                "'{catalog}' is not a catalog entity"
            )));
        };
        let context = CatalogContext {
            catalog: catalog.clone(),
            properties: entity.properties.clone(),
        };
        match self.registry.bind(provider_type, context) {
            Ok(provider) => Ok(provider),
            // Lost a bind race; the cached instance is the one to use.
            Err(err) => match self.registry.resolve(catalog)? {
                Some(provider) => Ok(provider),
                None => Err(err),
            },
        }
    }

    /// Bounds a provider call with the configured deadline. An elapsed
    /// deadline leaves the remote outcome unknown.
    async fn with_deadline<T>(
        &self,
        op: &str,
        call: impl Future<Output = ProviderResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.provider_deadline, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout {
                message: format!(
                    "provider call '{op}' exceeded the {}ms deadline; remote outcome unknown",
                    self.config.provider_deadline.as_millis()
                ),
            }),
        }
    }

    /// Shared optimistic alter: read, optional version pre-check, remote
    /// alter, conditional local write. Renames go through the store's
    /// rename path so the surrogate id survives.
    async fn alter_entity(
        &self,
        ident: &EntityIdent,
        changes: &[EntityChange],
        expected_version: Option<u64>,
        principal: &str,
        remote: RemoteSide,
    ) -> Result<Entity> {
        if changes.is_empty() {
            return Err(Error::validation("alter requires at least one change"));
        }
        let _guard = self.locks.acquire(ident, self.config.lock_wait).await?;
        let current = self.store.get(ident, false).await?;
        // A container rename would leave its children keyed under the old
        // path, so it is refused until the container is empty, same as drop.
        if changes.iter().any(EntityChange::is_rename) && ident.kind() != EntityKind::Object {
            self.ensure_no_live_children(ident).await?;
        }
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(Error::VersionConflict {
                    ident: ident.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }
        let next = current.apply_changes(changes, principal)?;

        match remote {
            RemoteSide::None => {}
            RemoteSide::Schema => {
                let provider = self.provider_for(ident).await?;
                self.with_deadline("alter_schema", provider.alter_schema(ident, changes))
                    .await?;
            }
            RemoteSide::Object => {
                let provider = self.provider_for(ident).await?;
                self.with_deadline("alter_object", provider.alter_object(ident, changes))
                    .await?;
            }
        }

        let written = if next.ident == current.ident {
            self.store
                .put(next, ExpectedVersion::Exact(current.version))
                .await?
        } else {
            self.store
                .rename(ident, next, ExpectedVersion::Exact(current.version))
                .await?
        };
        tracing::info!(ident = %ident, version = written.version, "Altered entity");
        Ok(written)
    }

    /// Runs the compensating remote drop after a failed local create.
    /// Compensation is attempted exactly once; a second failure leaves the
    /// remote committed with no local record, which is the one state this
    /// system cannot hide.
    async fn compensate_create(
        &self,
        ident: &EntityIdent,
        operation: &str,
        put_err: Error,
        drop_call: impl Future<Output = Result<()>>,
    ) -> Result<Entity> {
        match drop_call.await {
            Ok(()) => {
                tracing::warn!(
                    ident = %ident,
                    error = %put_err,
                    "Local write failed after remote create; compensated on the remote"
                );
                Err(put_err)
            }
            Err(comp_err) => Err(Error::PartialFailure {
                detail: PartialFailureDetail {
                    ident: ident.to_string(),
                    operation: operation.to_string(),
                    remote_committed: true,
                    local_committed: false,
                    failed_step: format!(
                        "entity store put failed ({put_err}); compensating remote drop failed ({comp_err})"
                    ),
                },
            }),
        }
    }

    fn drop_partial_failure(ident: &EntityIdent, operation: &str, err: &Error) -> Error {
        tracing::warn!(
            ident = %ident,
            error = %err,
            "Remote drop failed after local soft delete"
        );
        Error::PartialFailure {
            detail: PartialFailureDetail {
                ident: ident.to_string(),
                operation: operation.to_string(),
                remote_committed: false,
                local_committed: true,
                failed_step: format!("remote drop failed after local soft delete ({err})"),
            },
        }
    }

    /// Wraps an operation future with outcome metrics.
    async fn observed<T>(
        op: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = fut.await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        if matches!(&result, Err(Error::PartialFailure { .. })) {
            metrics::record_partial_failure(op);
        }
        metrics::record_operation(op, outcome, started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_provider::MemoryProviderFactory;
    use strata_store::{KvEntityStore, MemoryBackend};

    fn engine() -> FederationEngine {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(KvEntityStore::new(backend));
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(Arc::new(MemoryProviderFactory::new()))
            .unwrap();
        registry
            .register(Arc::new(MemoryProviderFactory::with_type("mock")))
            .unwrap();
        FederationEngine::new(store, registry)
    }

    fn metalake() -> EntityIdent {
        EntityIdent::metalake_of("t1").unwrap()
    }

    fn catalog() -> EntityIdent {
        EntityIdent::catalog_of("t1", "c1").unwrap()
    }

    fn schema() -> EntityIdent {
        EntityIdent::schema_of("t1", "c1", "s1").unwrap()
    }

    async fn seed_catalog(engine: &FederationEngine) {
        engine
            .create_metalake(&metalake(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        engine
            .create_catalog(&catalog(), "memory", None, BTreeMap::new(), "alice")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn metalake_lifecycle() {
        let engine = engine();
        let created = engine
            .create_metalake(&metalake(), Some("tenant one".into()), BTreeMap::new(), "alice")
            .await
            .unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.audit.creator, "alice");

        let altered = engine
            .alter_metalake(
                &metalake(),
                &[EntityChange::SetProperty {
                    key: "owner".into(),
                    value: "ops".into(),
                }],
                Some(1),
                "bob",
            )
            .await
            .unwrap();
        assert_eq!(altered.version, 2);
        assert_eq!(altered.audit.last_modifier.as_deref(), Some("bob"));

        let dropped = engine.drop_metalake(&metalake(), "bob").await.unwrap();
        assert_eq!(dropped.version, 3);
        assert!(!dropped.is_active());
        assert_eq!(dropped.audit.last_modifier.as_deref(), Some("bob"));
        assert!(dropped.audit.last_modified_time.is_some());

        assert_eq!(
            engine.load_metalake(&metalake(), false).await.unwrap_err().kind(),
            "NOT_FOUND"
        );
        assert!(engine.load_metalake(&metalake(), true).await.is_ok());
    }

    #[tokio::test]
    async fn create_requires_active_parent() {
        let engine = engine();
        let err = engine
            .create_catalog(&catalog(), "memory", None, BTreeMap::new(), "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn catalog_connection_failure_leaves_no_trace() {
        let engine = engine();
        engine
            .create_metalake(&metalake(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();

        let mut properties = BTreeMap::new();
        properties.insert("fail_connection".to_string(), "true".to_string());
        let err = engine
            .create_catalog(&catalog(), "memory", None, properties, "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "REMOTE_UNAVAILABLE");

        assert_eq!(
            engine.load_catalog(&catalog(), true).await.unwrap_err().kind(),
            "NOT_FOUND"
        );

        // A corrected retry with the same identifier succeeds.
        engine
            .create_catalog(&catalog(), "memory", None, BTreeMap::new(), "alice")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_provider_type_rejected() {
        let engine = engine();
        engine
            .create_metalake(&metalake(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        let err = engine
            .create_catalog(&catalog(), "warehouse", None, BTreeMap::new(), "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn schema_and_object_flow() {
        let engine = engine();
        seed_catalog(&engine).await;

        engine
            .create_schema(&schema(), Some("sales".into()), BTreeMap::new(), "alice")
            .await
            .unwrap();
        let names = engine.list_schemas(&catalog()).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].as_str(), "s1");

        let object = EntityIdent::object_of("t1", "c1", "s1", "orders").unwrap();
        let created = engine
            .create_object(&object, ObjectKind::Table, None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let objects = engine.list_objects(&schema()).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].as_str(), "orders");

        let summary = engine.describe_object(&object).await.unwrap();
        assert_eq!(summary.kind, ObjectKind::Table);
        assert_eq!(summary.name.as_str(), "orders");
    }

    #[tokio::test]
    async fn stale_alter_conflicts_then_fresh_retry_succeeds() {
        let engine = engine();
        seed_catalog(&engine).await;
        engine
            .create_schema(&schema(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();

        let set = |key: &str| {
            vec![EntityChange::SetProperty {
                key: key.into(),
                value: "x".into(),
            }]
        };

        // First writer wins from version 1.
        engine
            .alter_schema(&schema(), &set("a"), Some(1), "alice")
            .await
            .unwrap();

        // Second writer still holds version 1 and loses.
        let err = engine
            .alter_schema(&schema(), &set("b"), Some(1), "bob")
            .await
            .unwrap_err();
        let Error::VersionConflict { expected, actual, .. } = err else {
            panic!("expected a version conflict, got {err}");
        };
        assert_eq!(expected, 1);
        assert_eq!(actual, 2);

        // Retry from a fresh read succeeds.
        let fresh = engine.load_schema(&schema(), false).await.unwrap();
        let altered = engine
            .alter_schema(&schema(), &set("b"), Some(fresh.version), "bob")
            .await
            .unwrap();
        assert_eq!(altered.version, 3);
        assert_eq!(altered.properties.get("a").map(String::as_str), Some("x"));
        assert_eq!(altered.properties.get("b").map(String::as_str), Some("x"));
    }

    #[tokio::test]
    async fn drop_rejects_non_empty_containers() {
        let engine = engine();
        seed_catalog(&engine).await;
        engine
            .create_schema(&schema(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();

        assert_eq!(
            engine.drop_catalog(&catalog(), "alice").await.unwrap_err().kind(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            engine.drop_metalake(&metalake(), "alice").await.unwrap_err().kind(),
            "VALIDATION_ERROR"
        );

        engine.drop_schema(&schema(), "alice").await.unwrap();
        engine.drop_catalog(&catalog(), "alice").await.unwrap();
        engine.drop_metalake(&metalake(), "alice").await.unwrap();
    }

    #[tokio::test]
    async fn dropped_catalog_slot_held_until_purge() {
        let engine = engine();
        seed_catalog(&engine).await;
        engine.drop_catalog(&catalog(), "alice").await.unwrap();

        let err = engine
            .create_catalog(&catalog(), "memory", None, BTreeMap::new(), "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ALREADY_EXISTS");

        // After purge the identifier is reusable with a fresh id.
        let old_id = engine
            .load_catalog(&catalog(), true)
            .await
            .unwrap()
            .id;
        let far_future = Utc::now() + chrono::Duration::days(365);
        assert_eq!(engine.run_purge(far_future).await.unwrap(), 1);
        let recreated = engine
            .create_catalog(&catalog(), "memory", None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        assert_ne!(recreated.id, old_id);
        assert_eq!(recreated.version, 1);
    }

    #[tokio::test]
    async fn rename_preserves_id_on_both_sides() {
        let engine = engine();
        seed_catalog(&engine).await;
        engine
            .create_schema(&schema(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        let original = engine.load_schema(&schema(), false).await.unwrap();

        let renamed_ident = EntityIdent::schema_of("t1", "c1", "s2").unwrap();
        let renamed = engine
            .alter_schema(
                &schema(),
                &[EntityChange::Rename {
                    new_name: Name::new("s2").unwrap(),
                }],
                Some(1),
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(renamed.ident, renamed_ident);
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.version, 2);

        // Remote followed the rename.
        let names = engine.list_schemas(&catalog()).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].as_str(), "s2");

        // Old identifier is free again.
        assert_eq!(
            engine.load_schema(&schema(), true).await.unwrap_err().kind(),
            "NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn rename_rejects_non_empty_containers() {
        let engine = engine();
        seed_catalog(&engine).await;
        engine
            .create_schema(&schema(), None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        let object = EntityIdent::object_of("t1", "c1", "s1", "orders").unwrap();
        engine
            .create_object(&object, ObjectKind::Table, None, BTreeMap::new(), "alice")
            .await
            .unwrap();

        let rename = |name: &str| {
            vec![EntityChange::Rename {
                new_name: Name::new(name).unwrap(),
            }]
        };

        // Moving only the container record would strand the object under the
        // old path, so the rename is refused while children exist.
        let err = engine
            .alter_schema(&schema(), &rename("s2"), Some(1), "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(engine.load_object(&object, false).await.is_ok());
        assert_eq!(
            engine
                .alter_catalog(&catalog(), &rename("c2"), None, "alice")
                .await
                .unwrap_err()
                .kind(),
            "VALIDATION_ERROR"
        );

        // Emptying the schema unblocks it.
        engine.drop_object(&object, "alice").await.unwrap();
        let renamed = engine
            .alter_schema(&schema(), &rename("s2"), Some(1), "alice")
            .await
            .unwrap();
        assert_eq!(renamed.ident.name.as_str(), "s2");
    }

    #[tokio::test]
    async fn test_connection_probe_is_side_effect_free() {
        let engine = engine();
        engine
            .test_catalog_connection(&catalog(), "memory", BTreeMap::new())
            .await
            .unwrap();

        let mut properties = BTreeMap::new();
        properties.insert("fail_connection".to_string(), "true".to_string());
        let err = engine
            .test_catalog_connection(&catalog(), "memory", properties)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "REMOTE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn rebind_catalogs_restores_bindings() {
        let backend = Arc::new(MemoryBackend::new());
        let store: Arc<dyn EntityStore> = Arc::new(KvEntityStore::new(Arc::clone(&backend) as _));

        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(Arc::new(MemoryProviderFactory::new()))
            .unwrap();
        let engine = FederationEngine::new(Arc::clone(&store), registry);
        seed_catalog(&engine).await;

        // Fresh process: same backend, cold registry.
        let registry2 = Arc::new(ProviderRegistry::new());
        registry2
            .register(Arc::new(MemoryProviderFactory::new()))
            .unwrap();
        let engine2 = FederationEngine::new(
            Arc::new(KvEntityStore::new(backend)),
            Arc::clone(&registry2),
        );
        assert_eq!(engine2.rebind_catalogs().await.unwrap(), 1);
        assert!(registry2.resolve(&catalog()).unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_same_identifier_creates_have_one_winner() {
        let engine = Arc::new(engine());
        seed_catalog(&engine).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .create_schema(&schema(), None, BTreeMap::new(), "alice")
                    .await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(entity) => {
                    created += 1;
                    assert_eq!(entity.version, 1);
                }
                Err(err) => {
                    assert_eq!(err.kind(), "ALREADY_EXISTS");
                    conflicts += 1;
                }
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }
}
