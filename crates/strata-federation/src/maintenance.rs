//! Background maintenance.
//!
//! One interval task per process runs the retention purge. The request
//! path never purges; a slow backend only slows this loop down.

use std::sync::Arc;

use chrono::Utc;

use crate::engine::FederationEngine;
use crate::metrics;

/// Spawns the purge loop on the engine's configured interval.
///
/// The returned handle can be aborted at shutdown; an aborted run leaves
/// at most one purge pass incomplete, which the next process repeats
/// harmlessly.
pub fn spawn_maintenance(engine: Arc<FederationEngine>) -> tokio::task::JoinHandle<()> {
    let interval = engine.config().purge_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = engine.run_purge(Utc::now()).await {
                metrics::record_purge_error();
                tracing::warn!(error = %err, "Purge run failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use strata_core::ident::EntityIdent;
    use strata_provider::ProviderRegistry;
    use strata_store::{KvEntityStore, MemoryBackend};

    #[tokio::test]
    async fn purge_loop_removes_expired_records() {
        let backend = Arc::new(MemoryBackend::new());
        // Zero retention so a soft delete is purgeable immediately.
        let store = Arc::new(KvEntityStore::with_retention(
            backend,
            chrono::Duration::zero(),
        ));
        let engine = Arc::new(FederationEngine::with_config(
            store,
            Arc::new(ProviderRegistry::new()),
            EngineConfig {
                purge_interval: Duration::from_millis(20),
                ..EngineConfig::default()
            },
        ));

        let metalake = EntityIdent::metalake_of("t1").unwrap();
        engine
            .create_metalake(&metalake, None, BTreeMap::new(), "alice")
            .await
            .unwrap();
        engine.drop_metalake(&metalake, "alice").await.unwrap();
        assert!(engine.load_metalake(&metalake, true).await.is_ok());

        let handle = spawn_maintenance(Arc::clone(&engine));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(
            engine.load_metalake(&metalake, true).await.unwrap_err().kind(),
            "NOT_FOUND"
        );
    }
}
