//! `strata-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use strata_api::config::Config;
use strata_api::server::Server;
use strata_core::{init_logging, LogFormat};
use strata_federation::FederationEngine;
use strata_provider::{MemoryProviderFactory, ProviderFactory, ProviderRegistry};
use strata_store::{KvEntityStore, MemoryBackend};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    if !config.debug {
        tracing::warn!(
            "No durable backend is wired yet; the in-memory entity store loses state on restart"
        );
    }

    let store = Arc::new(KvEntityStore::with_retention(
        Arc::new(MemoryBackend::new()),
        config.retention(),
    ));
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(MemoryProviderFactory::new()) as Arc<dyn ProviderFactory>)?;

    let engine = Arc::new(FederationEngine::with_config(
        store,
        registry,
        config.engine_config(),
    ));

    let server = Server::with_engine(config, engine);
    server.serve().await?;
    Ok(())
}
