//! In-memory reference provider.
//!
//! Holds schemas and objects in process memory. Used as the development
//! backend and as the `mock` provider in tests. Supports fault injection so
//! engine tests can exercise the compensation paths.
//!
//! Recognized configuration keys:
//!
//! - `fail_connection`: when `"true"`, `test_connection` reports the remote
//!   as unavailable
//! - `object_kind`: the native unit this provider exposes (`table`,
//!   `fileset`, or `topic`; default `table`)

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use strata_core::entity::{EntityChange, ObjectKind};
use strata_core::ident::EntityIdent;
use strata_core::name::Name;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{CatalogContext, CatalogProvider, ObjectSummary, ProviderFactory};

#[derive(Debug, Clone, Default)]
struct SchemaRecord {
    properties: BTreeMap<String, String>,
    objects: HashMap<String, ObjectRecord>,
}

#[derive(Debug, Clone)]
struct ObjectRecord {
    kind: ObjectKind,
    properties: BTreeMap<String, String>,
}

fn poison<T>(_: PoisonError<T>) -> ProviderError {
    ProviderError::Unavailable("provider state lock poisoned".into())
}

/// In-memory provider serving one catalog.
#[derive(Debug)]
pub struct MemoryCatalogProvider {
    context: CatalogContext,
    native_kind: ObjectKind,
    schemas: RwLock<HashMap<String, SchemaRecord>>,
    /// Fault injection: fails one call after skipping the configured count.
    fail_next: Mutex<Option<(usize, ProviderError)>>,
}

impl MemoryCatalogProvider {
    /// Creates a provider for the given catalog context.
    #[must_use]
    pub fn new(context: CatalogContext) -> Self {
        let native_kind = match context.properties.get("object_kind").map(String::as_str) {
            Some("fileset") => ObjectKind::Fileset,
            Some("topic") => ObjectKind::Topic,
            _ => ObjectKind::Table,
        };
        Self {
            context,
            native_kind,
            schemas: RwLock::new(HashMap::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Arms fault injection: the next call fails with `error`.
    pub fn fail_next_call(&self, error: ProviderError) {
        self.fail_call(0, error);
    }

    /// Arms fault injection: the call after `skip` successful calls fails
    /// with `error`.
    pub fn fail_call(&self, skip: usize, error: ProviderError) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some((skip, error));
        }
    }

    /// Returns the catalog this provider serves.
    #[must_use]
    pub fn catalog(&self) -> &EntityIdent {
        &self.context.catalog
    }

    fn take_injected_fault(&self) -> ProviderResult<()> {
        let mut slot = self.fail_next.lock().map_err(poison)?;
        match slot.take() {
            Some((0, error)) => Err(error),
            Some((skip, error)) => {
                *slot = Some((skip - 1, error));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalogProvider {
    async fn test_connection(&self) -> ProviderResult<()> {
        self.take_injected_fault()?;
        if self
            .context
            .properties
            .get("fail_connection")
            .is_some_and(|v| v == "true")
        {
            return Err(ProviderError::Unavailable(format!(
                "configured to fail connection probe for catalog '{}'",
                self.context.catalog
            )));
        }
        Ok(())
    }

    async fn list_schemas(&self) -> ProviderResult<Vec<Name>> {
        self.take_injected_fault()?;
        let schemas = self.schemas.read().map_err(poison)?;
        Ok(schemas
            .keys()
            .map(|name| Name::new_unchecked(name.clone()))
            .collect())
    }

    async fn create_schema(
        &self,
        schema: &EntityIdent,
        _comment: Option<&str>,
        properties: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        self.take_injected_fault()?;
        let mut schemas = self.schemas.write().map_err(poison)?;
        let name = schema.name.to_string();
        if schemas.contains_key(&name) {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' already exists on the remote"
            )));
        }
        schemas.insert(
            name,
            SchemaRecord {
                properties: properties.clone(),
                objects: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn alter_schema(
        &self,
        schema: &EntityIdent,
        changes: &[EntityChange],
    ) -> ProviderResult<()> {
        self.take_injected_fault()?;
        let mut schemas = self.schemas.write().map_err(poison)?;
        let name = schema.name.to_string();
        let Some(mut record) = schemas.remove(&name) else {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        };
        let mut new_name = name;
        for change in changes {
            match change {
                EntityChange::SetProperty { key, value } => {
                    record.properties.insert(key.clone(), value.clone());
                }
                EntityChange::RemoveProperty { key } => {
                    record.properties.remove(key);
                }
                EntityChange::Rename { new_name: n } => {
                    new_name = n.to_string();
                }
                EntityChange::UpdateComment { .. } => {}
            }
        }
        schemas.insert(new_name, record);
        Ok(())
    }

    async fn drop_schema(&self, schema: &EntityIdent) -> ProviderResult<()> {
        self.take_injected_fault()?;
        let mut schemas = self.schemas.write().map_err(poison)?;
        if schemas.remove(schema.name.as_str()).is_none() {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        }
        Ok(())
    }

    async fn list_objects(&self, schema: &EntityIdent) -> ProviderResult<Vec<Name>> {
        self.take_injected_fault()?;
        let schemas = self.schemas.read().map_err(poison)?;
        let Some(record) = schemas.get(schema.name.as_str()) else {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        };
        Ok(record
            .objects
            .keys()
            .map(|name| Name::new_unchecked(name.clone()))
            .collect())
    }

    async fn create_object(
        &self,
        object: &EntityIdent,
        kind: ObjectKind,
        _comment: Option<&str>,
        properties: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        self.take_injected_fault()?;
        if kind != self.native_kind {
            return Err(ProviderError::NotSupported(format!(
                "this provider serves {} objects, not {kind}",
                self.native_kind
            )));
        }
        let Some(schema) = object.parent() else {
            return Err(ProviderError::Rejected(format!(
                "'{object}' is not an object identifier"
            )));
        };
        let mut schemas = self.schemas.write().map_err(poison)?;
        let Some(record) = schemas.get_mut(schema.name.as_str()) else {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        };
        let name = object.name.to_string();
        if record.objects.contains_key(&name) {
            return Err(ProviderError::Rejected(format!(
                "object '{object}' already exists on the remote"
            )));
        }
        record.objects.insert(
            name,
            ObjectRecord {
                kind,
                properties: properties.clone(),
            },
        );
        Ok(())
    }

    async fn alter_object(
        &self,
        object: &EntityIdent,
        changes: &[EntityChange],
    ) -> ProviderResult<()> {
        self.take_injected_fault()?;
        let Some(schema) = object.parent() else {
            return Err(ProviderError::Rejected(format!(
                "'{object}' is not an object identifier"
            )));
        };
        let mut schemas = self.schemas.write().map_err(poison)?;
        let Some(schema_record) = schemas.get_mut(schema.name.as_str()) else {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        };
        let name = object.name.to_string();
        let Some(mut record) = schema_record.objects.remove(&name) else {
            return Err(ProviderError::Rejected(format!(
                "object '{object}' does not exist on the remote"
            )));
        };
        let mut new_name = name;
        for change in changes {
            match change {
                EntityChange::SetProperty { key, value } => {
                    record.properties.insert(key.clone(), value.clone());
                }
                EntityChange::RemoveProperty { key } => {
                    record.properties.remove(key);
                }
                EntityChange::Rename { new_name: n } => {
                    new_name = n.to_string();
                }
                EntityChange::UpdateComment { .. } => {}
            }
        }
        schema_record.objects.insert(new_name, record);
        Ok(())
    }

    async fn drop_object(&self, object: &EntityIdent) -> ProviderResult<()> {
        self.take_injected_fault()?;
        let Some(schema) = object.parent() else {
            return Err(ProviderError::Rejected(format!(
                "'{object}' is not an object identifier"
            )));
        };
        let mut schemas = self.schemas.write().map_err(poison)?;
        let Some(record) = schemas.get_mut(schema.name.as_str()) else {
            return Err(ProviderError::Rejected(format!(
                "schema '{schema}' does not exist on the remote"
            )));
        };
        if record.objects.remove(object.name.as_str()).is_none() {
            return Err(ProviderError::Rejected(format!(
                "object '{object}' does not exist on the remote"
            )));
        }
        Ok(())
    }

    async fn load_object(&self, object: &EntityIdent) -> ProviderResult<ObjectSummary> {
        self.take_injected_fault()?;
        let Some(schema) = object.parent() else {
            return Err(ProviderError::Rejected(format!(
                "'{object}' is not an object identifier"
            )));
        };
        let schemas = self.schemas.read().map_err(poison)?;
        let record = schemas
            .get(schema.name.as_str())
            .and_then(|s| s.objects.get(object.name.as_str()))
            .ok_or_else(|| {
                ProviderError::Rejected(format!("object '{object}' does not exist on the remote"))
            })?;
        Ok(ObjectSummary {
            name: object.name.clone(),
            kind: record.kind,
            properties: record.properties.clone(),
        })
    }
}

/// Factory for [`MemoryCatalogProvider`] instances.
///
/// Keeps a handle to every instance it creates so tests can reach the
/// concrete provider behind a registry binding (for fault injection).
pub struct MemoryProviderFactory {
    provider_type: String,
    created: Mutex<Vec<Arc<MemoryCatalogProvider>>>,
}

impl MemoryProviderFactory {
    /// Factory registered under the `memory` type string.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider_type: "memory".to_string(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Factory registered under an alternate type string (e.g. `mock`).
    #[must_use]
    pub fn with_type(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Returns the most recently created instance, if any.
    #[must_use]
    pub fn last_created(&self) -> Option<Arc<MemoryCatalogProvider>> {
        self.created
            .lock()
            .ok()
            .and_then(|created| created.last().cloned())
    }
}

impl Default for MemoryProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for MemoryProviderFactory {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn create(&self, context: CatalogContext) -> Arc<dyn CatalogProvider> {
        let provider = Arc::new(MemoryCatalogProvider::new(context));
        if let Ok(mut created) = self.created.lock() {
            created.push(Arc::clone(&provider));
        }
        provider
    }
}
