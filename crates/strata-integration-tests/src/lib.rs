//! Shared harness for the end-to-end scenario tests.
//!
//! Builds a fully wired federation engine over the in-memory backend with
//! the `memory` and `mock` provider factories registered, mirroring how
//! the binary wires production components.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use strata_federation::{EngineConfig, FederationEngine};
use strata_provider::{MemoryProviderFactory, ProviderFactory, ProviderRegistry};
use strata_store::{KvEntityStore, MemoryBackend};

/// A wired engine plus handles the tests reach into.
pub struct Harness {
    /// The engine under test.
    pub engine: Arc<FederationEngine>,
    /// The `mock` provider factory, for reaching injected providers.
    pub mock_factory: Arc<MemoryProviderFactory>,
    /// The shared backend, for building a second engine over the same state.
    pub backend: Arc<MemoryBackend>,
}

/// Builds a harness with default engine tuning and week-long retention.
///
/// # Panics
///
/// Panics if factory registration fails; the registry is freshly built.
#[must_use]
pub fn harness() -> Harness {
    harness_with(EngineConfig::default(), chrono::Duration::hours(24 * 7))
}

/// Builds a harness with explicit tuning and retention.
///
/// # Panics
///
/// Panics if factory registration fails; the registry is freshly built.
#[must_use]
pub fn harness_with(config: EngineConfig, retention: chrono::Duration) -> Harness {
    build(Arc::new(MemoryBackend::new()), config, retention)
}

/// Builds a harness over an existing backend, simulating a process restart
/// against surviving store state.
///
/// # Panics
///
/// Panics if factory registration fails; the registry is freshly built.
#[must_use]
pub fn harness_from_backend(backend: Arc<MemoryBackend>) -> Harness {
    build(
        backend,
        EngineConfig::default(),
        chrono::Duration::hours(24 * 7),
    )
}

fn build(backend: Arc<MemoryBackend>, config: EngineConfig, retention: chrono::Duration) -> Harness {
    let store = Arc::new(KvEntityStore::with_retention(
        Arc::clone(&backend) as Arc<dyn strata_store::MetaBackend>,
        retention,
    ));

    let mock_factory = Arc::new(MemoryProviderFactory::with_type("mock"));
    let registry = Arc::new(ProviderRegistry::new());
    registry
        .register(Arc::new(MemoryProviderFactory::new()) as Arc<dyn ProviderFactory>)
        .expect("register memory factory");
    registry
        .register(Arc::clone(&mock_factory) as Arc<dyn ProviderFactory>)
        .expect("register mock factory");

    Harness {
        engine: Arc::new(FederationEngine::with_config(store, registry, config)),
        mock_factory,
        backend,
    }
}
