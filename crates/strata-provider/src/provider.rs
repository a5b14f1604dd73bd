//! The capability surface every catalog provider implements.
//!
//! Default method bodies return [`ProviderError::NotSupported`] so a
//! partial-capability provider (for example a topic broker with no object
//! alter) stays honest without boilerplate.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::entity::{EntityChange, ObjectKind};
use strata_core::ident::EntityIdent;
use strata_core::name::Name;

use crate::error::{ProviderError, ProviderResult};

/// The catalog a provider instance serves, plus its configuration bag.
///
/// The property bag is passed through verbatim from catalog creation; the
/// core does not interpret provider-specific keys.
#[derive(Debug, Clone)]
pub struct CatalogContext {
    /// Identifier of the catalog entity.
    pub catalog: EntityIdent,
    /// Provider-specific configuration.
    pub properties: BTreeMap<String, String>,
}

/// Provider-native detail for a loaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Leaf name of the object.
    pub name: Name,
    /// The provider-native unit kind.
    pub kind: ObjectKind,
    /// Provider-side properties.
    pub properties: BTreeMap<String, String>,
}

/// A pluggable adapter translating the core object model into operations
/// against one class of external system.
///
/// A provider instance serves exactly one catalog and exclusively owns any
/// connection or session resources to its remote system.
#[allow(unused_variables)]
#[async_trait]
pub trait CatalogProvider: Send + Sync + std::fmt::Debug {
    /// Probes the remote system with the configured connection settings.
    ///
    /// Called once at catalog creation to fail fast on bad configuration.
    async fn test_connection(&self) -> ProviderResult<()>;

    /// Lists schema names known to the remote system.
    async fn list_schemas(&self) -> ProviderResult<Vec<Name>> {
        Err(ProviderError::NotSupported(
            "schema listing is not supported by this provider".into(),
        ))
    }

    /// Creates a schema on the remote system.
    async fn create_schema(
        &self,
        schema: &EntityIdent,
        comment: Option<&str>,
        properties: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "schema creation is not supported by this provider".into(),
        ))
    }

    /// Applies changes to a schema on the remote system.
    async fn alter_schema(
        &self,
        schema: &EntityIdent,
        changes: &[EntityChange],
    ) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "schema alteration is not supported by this provider".into(),
        ))
    }

    /// Drops a schema on the remote system.
    async fn drop_schema(&self, schema: &EntityIdent) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "schema drop is not supported by this provider".into(),
        ))
    }

    /// Lists object names in a schema on the remote system.
    async fn list_objects(&self, schema: &EntityIdent) -> ProviderResult<Vec<Name>> {
        Err(ProviderError::NotSupported(
            "object listing is not supported by this provider".into(),
        ))
    }

    /// Creates the provider-native unit (table, fileset, topic).
    async fn create_object(
        &self,
        object: &EntityIdent,
        kind: ObjectKind,
        comment: Option<&str>,
        properties: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "object creation is not supported by this provider".into(),
        ))
    }

    /// Applies changes to an object on the remote system.
    async fn alter_object(
        &self,
        object: &EntityIdent,
        changes: &[EntityChange],
    ) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "object alteration is not supported by this provider".into(),
        ))
    }

    /// Drops an object on the remote system.
    async fn drop_object(&self, object: &EntityIdent) -> ProviderResult<()> {
        Err(ProviderError::NotSupported(
            "object drop is not supported by this provider".into(),
        ))
    }

    /// Loads provider-native detail for an object.
    async fn load_object(&self, object: &EntityIdent) -> ProviderResult<ObjectSummary> {
        Err(ProviderError::NotSupported(
            "object loading is not supported by this provider".into(),
        ))
    }

    /// Releases remote connections and session resources.
    ///
    /// Called when the catalog is dropped or the service shuts down.
    async fn shutdown(&self) -> ProviderResult<()> {
        Ok(())
    }
}

/// Constructs provider instances for one provider type string.
///
/// Registered explicitly with the [`crate::ProviderRegistry`]; dispatch is a
/// trait-object lookup, never reflection.
pub trait ProviderFactory: Send + Sync {
    /// The provider type string this factory serves (e.g. `memory`).
    fn provider_type(&self) -> &str;

    /// Builds a provider instance for one catalog.
    ///
    /// Configuration errors should be deferred to `test_connection`, which
    /// the engine always calls before exposing the catalog.
    fn create(&self, context: CatalogContext) -> Arc<dyn CatalogProvider>;
}
