//! Provider registry: type-string dispatch and per-catalog bindings.
//!
//! The registry is an explicit object constructed at service startup and
//! passed by reference to the federation engine — never ambient global
//! state. It owns one cached provider instance per live catalog and tears
//! instances down when the catalog is dropped or the process shuts down.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use strata_core::error::{Error, Result};
use strata_core::ident::EntityIdent;

use crate::provider::{CatalogContext, CatalogProvider, ProviderFactory};

fn poison<T>(_: PoisonError<T>) -> Error {
    Error::internal("provider registry lock poisoned")
}

/// Resolves provider type strings to factories and caches one provider
/// instance per live catalog.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ProviderFactory>>>,
    bindings: RwLock<HashMap<EntityIdent, Arc<dyn CatalogProvider>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for its provider type string.
    ///
    /// Re-registering a type replaces the previous factory; existing
    /// bindings keep the instance they were built with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry lock is poisoned.
    pub fn register(&self, factory: Arc<dyn ProviderFactory>) -> Result<()> {
        let provider_type = factory.provider_type().to_string();
        let mut factories = self.factories.write().map_err(poison)?;
        if factories.insert(provider_type.clone(), factory).is_some() {
            tracing::warn!(provider_type = %provider_type, "Replacing registered provider factory");
        }
        Ok(())
    }

    /// Returns true when a factory is registered for the type string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry lock is poisoned.
    pub fn supports(&self, provider_type: &str) -> Result<bool> {
        Ok(self
            .factories
            .read()
            .map_err(poison)?
            .contains_key(provider_type))
    }

    /// Instantiates and caches a provider for a catalog.
    ///
    /// Exactly one instance exists per live catalog; binding an already
    /// bound catalog is an internal error (the engine serializes catalog
    /// lifecycle operations under its path lock).
    ///
    /// # Errors
    ///
    /// - [`Error::NotSupported`] when no factory serves `provider_type`
    /// - [`Error::Internal`] when the catalog is already bound
    pub fn bind(
        &self,
        provider_type: &str,
        context: CatalogContext,
    ) -> Result<Arc<dyn CatalogProvider>> {
        let factory = {
            let factories = self.factories.read().map_err(poison)?;
            factories.get(provider_type).cloned()
        }
        .ok_or_else(|| Error::NotSupported {
            message: format!("no provider registered for type '{provider_type}'"),
        })?;

        let catalog = context.catalog.clone();
        let provider = factory.create(context);

        let mut bindings = self.bindings.write().map_err(poison)?;
        if bindings.contains_key(&catalog) {
            return Err(Error::internal(format!(
                "catalog '{catalog}' already has a bound provider"
            )));
        }
        bindings.insert(catalog.clone(), Arc::clone(&provider));
        drop(bindings);

        tracing::info!(catalog = %catalog, provider_type = %provider_type, "Bound catalog provider");
        Ok(provider)
    }

    /// Instantiates a provider without caching it.
    ///
    /// Used for one-off connection probes where no catalog entity exists
    /// yet; callers are responsible for shutting the instance down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when no factory serves
    /// `provider_type`.
    pub fn create_unbound(
        &self,
        provider_type: &str,
        context: CatalogContext,
    ) -> Result<Arc<dyn CatalogProvider>> {
        let factory = {
            let factories = self.factories.read().map_err(poison)?;
            factories.get(provider_type).cloned()
        }
        .ok_or_else(|| Error::NotSupported {
            message: format!("no provider registered for type '{provider_type}'"),
        })?;
        Ok(factory.create(context))
    }

    /// Returns the cached provider bound to a catalog, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry lock is poisoned.
    pub fn resolve(&self, catalog: &EntityIdent) -> Result<Option<Arc<dyn CatalogProvider>>> {
        Ok(self.bindings.read().map_err(poison)?.get(catalog).cloned())
    }

    /// Removes a catalog's binding and releases the provider's resources.
    ///
    /// Idempotent: unbinding an unbound catalog is a no-op.
    pub async fn unbind(&self, catalog: &EntityIdent) -> Result<()> {
        let provider = {
            let mut bindings = self.bindings.write().map_err(poison)?;
            bindings.remove(catalog)
        };
        if let Some(provider) = provider {
            if let Err(e) = provider.shutdown().await {
                // Teardown failure cannot resurrect the binding; log and move on.
                tracing::warn!(catalog = %catalog, error = %e, "Provider shutdown reported an error");
            }
            tracing::info!(catalog = %catalog, "Unbound catalog provider");
        }
        Ok(())
    }

    /// Tears down all bindings; called at process shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        let drained: Vec<(EntityIdent, Arc<dyn CatalogProvider>)> = {
            let mut bindings = self.bindings.write().map_err(poison)?;
            bindings.drain().collect()
        };
        for (catalog, provider) in drained {
            if let Err(e) = provider.shutdown().await {
                tracing::warn!(catalog = %catalog, error = %e, "Provider shutdown reported an error");
            }
        }
        Ok(())
    }

    /// Number of live bindings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry lock is poisoned.
    pub fn binding_count(&self) -> Result<usize> {
        Ok(self.bindings.read().map_err(poison)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProviderFactory;
    use std::collections::BTreeMap;

    fn context(catalog: &str) -> CatalogContext {
        CatalogContext {
            catalog: EntityIdent::catalog_of("t1", catalog).unwrap(),
            properties: BTreeMap::new(),
        }
    }

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MemoryProviderFactory::new()))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn bind_resolve_unbind() {
        let registry = registry();
        let catalog = EntityIdent::catalog_of("t1", "c1").unwrap();

        assert!(registry.resolve(&catalog).unwrap().is_none());
        registry.bind("memory", context("c1")).unwrap();
        assert!(registry.resolve(&catalog).unwrap().is_some());
        assert_eq!(registry.binding_count().unwrap(), 1);

        registry.unbind(&catalog).await.unwrap();
        assert!(registry.resolve(&catalog).unwrap().is_none());
        // Idempotent.
        registry.unbind(&catalog).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_type_is_not_supported() {
        let registry = registry();
        let err = registry.bind("warehouse", context("c1")).unwrap_err();
        assert_eq!(err.kind(), "NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn double_bind_is_internal_error() {
        let registry = registry();
        registry.bind("memory", context("c1")).unwrap();
        let err = registry.bind("memory", context("c1")).unwrap_err();
        assert_eq!(err.kind(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn shutdown_drains_bindings() {
        let registry = registry();
        registry.bind("memory", context("c1")).unwrap();
        registry.bind("memory", context("c2")).unwrap();
        registry.shutdown().await.unwrap();
        assert_eq!(registry.binding_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn create_unbound_does_not_cache() {
        let registry = registry();
        let provider = registry.create_unbound("memory", context("c1")).unwrap();
        provider.test_connection().await.unwrap();
        assert_eq!(registry.binding_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn supports_reflects_registration() {
        let registry = registry();
        assert!(registry.supports("memory").unwrap());
        assert!(!registry.supports("jdbc").unwrap());
        registry
            .register(Arc::new(MemoryProviderFactory::with_type("mock")))
            .unwrap();
        assert!(registry.supports("mock").unwrap());
    }
}
