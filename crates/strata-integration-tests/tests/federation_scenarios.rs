//! End-to-end scenarios exercising the full engine through its public API.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::{EntityChange, EntityIdent, ObjectKind};
use strata_federation::EngineConfig;
use strata_integration_tests::{harness, harness_with};
use strata_provider::CatalogProvider;

const PRINCIPAL: &str = "it-suite";

fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

async fn seed_schema(engine: &strata_federation::FederationEngine) -> EntityIdent {
    let metalake = EntityIdent::metalake_of("m1").unwrap();
    let catalog = EntityIdent::catalog_of("m1", "c1").unwrap();
    let schema = EntityIdent::schema_of("m1", "c1", "s1").unwrap();

    engine
        .create_metalake(&metalake, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    engine
        .create_catalog(&catalog, "mock", None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    engine
        .create_schema(&schema, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    schema
}

#[tokio::test]
async fn full_lifecycle_across_both_systems() {
    let h = harness();
    let metalake = EntityIdent::metalake_of("m1").unwrap();
    let catalog = EntityIdent::catalog_of("m1", "c1").unwrap();
    let schema = EntityIdent::schema_of("m1", "c1", "s1").unwrap();
    let object = EntityIdent::object_of("m1", "c1", "s1", "o1").unwrap();

    let lake = h
        .engine
        .create_metalake(
            &metalake,
            Some("test lake".to_string()),
            props(&[("tier", "gold")]),
            PRINCIPAL,
        )
        .await
        .unwrap();
    assert_eq!(lake.version, 1);
    assert_eq!(lake.audit.creator, PRINCIPAL);

    h.engine
        .create_catalog(&catalog, "mock", None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    h.engine
        .create_schema(&schema, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    let created = h
        .engine
        .create_object(
            &object,
            ObjectKind::Table,
            None,
            props(&[("format", "parquet")]),
            PRINCIPAL,
        )
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    // Lists reflect the remote provider, describe fetches live detail.
    let schemas = h.engine.list_schemas(&catalog).await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].as_str(), "s1");
    let objects = h.engine.list_objects(&schema).await.unwrap();
    assert_eq!(objects.len(), 1);
    let summary = h.engine.describe_object(&object).await.unwrap();
    assert_eq!(summary.kind, ObjectKind::Table);
    assert_eq!(summary.properties.get("format").map(String::as_str), Some("parquet"));

    // Drop bottom-up; each level refuses while it still has live children.
    let err = h.engine.drop_metalake(&metalake, PRINCIPAL).await.unwrap_err();
    assert_eq!(err.kind(), "VALIDATION_ERROR");

    h.engine.drop_object(&object, PRINCIPAL).await.unwrap();
    h.engine.drop_schema(&schema, PRINCIPAL).await.unwrap();
    h.engine.drop_catalog(&catalog, PRINCIPAL).await.unwrap();
    let dropped = h.engine.drop_metalake(&metalake, PRINCIPAL).await.unwrap();
    assert!(!dropped.state.is_active());

    // Deleted records stay reachable only when asked for.
    let err = h.engine.load_object(&object, false).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
    let held = h.engine.load_object(&object, true).await.unwrap();
    assert!(!held.state.is_active());

    // The remote side was cleaned up too.
    let provider = h.mock_factory.last_created().unwrap();
    assert!(provider.list_schemas().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_same_identifier_creates_have_one_winner() {
    let h = harness();
    seed_schema(&h.engine).await;
    let object = EntityIdent::object_of("m1", "c1", "s1", "contested").unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&h.engine);
        let ident = object.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_object(&ident, ObjectKind::Table, None, BTreeMap::new(), PRINCIPAL)
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

    let stored = h.engine.load_object(&object, false).await.unwrap();
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn stale_alter_conflicts_until_retried_from_fresh_read() {
    let h = harness();
    let schema = seed_schema(&h.engine).await;

    let set_owner = [EntityChange::SetProperty {
        key: "owner".to_string(),
        value: "team-a".to_string(),
    }];
    let altered = h
        .engine
        .alter_schema(&schema, &set_owner, Some(1), PRINCIPAL)
        .await
        .unwrap();
    assert_eq!(altered.version, 2);

    // A second writer still holding version 1 loses the race.
    let set_note = [EntityChange::SetProperty {
        key: "note".to_string(),
        value: "stale".to_string(),
    }];
    let err = h
        .engine
        .alter_schema(&schema, &set_note, Some(1), PRINCIPAL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "VERSION_CONFLICT");

    // Retrying from a fresh read succeeds and loses nothing.
    let fresh = h.engine.load_schema(&schema, false).await.unwrap();
    let retried = h
        .engine
        .alter_schema(&schema, &set_note, Some(fresh.version), PRINCIPAL)
        .await
        .unwrap();
    assert_eq!(retried.version, 3);
    assert_eq!(retried.properties.get("owner").map(String::as_str), Some("team-a"));
    assert_eq!(retried.properties.get("note").map(String::as_str), Some("stale"));
}

#[tokio::test]
async fn purged_identifier_can_be_recreated_with_a_new_id() {
    let h = harness_with(EngineConfig::default(), chrono::Duration::zero());
    let metalake = EntityIdent::metalake_of("ephemeral").unwrap();

    let first = h
        .engine
        .create_metalake(&metalake, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    h.engine.drop_metalake(&metalake, PRINCIPAL).await.unwrap();

    // The DELETED record still holds the identifier until purge.
    let err = h
        .engine
        .create_metalake(&metalake, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ALREADY_EXISTS");

    let purged = h.engine.run_purge(chrono::Utc::now()).await.unwrap();
    assert_eq!(purged, 1);

    let second = h
        .engine
        .create_metalake(&metalake, None, BTreeMap::new(), PRINCIPAL)
        .await
        .unwrap();
    assert_eq!(second.version, 1);
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn bindings_survive_a_restart_via_rebind() {
    let h = harness();
    seed_schema(&h.engine).await;
    let catalog = EntityIdent::catalog_of("m1", "c1").unwrap();

    // A second engine over the same backend simulates a fresh process.
    let restarted = strata_integration_tests::harness_from_backend(Arc::clone(&h.backend));
    let rebound = restarted.engine.rebind_catalogs().await.unwrap();
    assert_eq!(rebound, 1);

    // The rebound provider serves list traffic immediately.
    let schemas = restarted.engine.list_schemas(&catalog).await.unwrap();
    assert_eq!(schemas.len(), 0); // fresh mock instance has no remote state
}
