//! End-to-end tests driving the HTTP surface with in-process requests.

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use strata_api::config::Config;
use strata_api::server::Server;

const PRINCIPAL: &str = "http-suite";

fn test_router() -> Router {
    Server::new(Config::default()).test_router()
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-principal", PRINCIPAL);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string())),
        None => {
            builder = builder.header("accept", "application/vnd.strata.v1+json");
            builder.body(Body::empty())
        }
    }
    .context("build request")?;

    let response = router
        .clone()
        .oneshot(request)
        .await
        .map_err(|err| -> anyhow::Error { match err {} })?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .context("read response body")?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("parse JSON body")?
    };
    Ok((status, value))
}

#[tokio::test]
async fn http_lifecycle_walks_the_hierarchy() -> Result<()> {
    let router = test_router();

    let (status, lake) = send(
        &router,
        "POST",
        "/api/v1/metalakes",
        Some(json!({"name": "m1", "comment": "lake", "properties": {"tier": "gold"}})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lake["name"], "m1");
    assert_eq!(lake["version"], 1);
    assert_eq!(lake["state"], "active");
    assert_eq!(lake["audit"]["creator"], PRINCIPAL);

    let (status, catalog) = send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs",
        Some(json!({"name": "c1", "providerType": "memory"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(catalog["providerType"], "memory");

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs/c1/schemas",
        Some(json!({"name": "s1"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, object) = send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs/c1/schemas/s1/objects",
        Some(json!({"name": "o1", "kind": "table", "properties": {"format": "parquet"}})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(object["kind"], "table");

    let (status, listed) = send(
        &router,
        "GET",
        "/api/v1/metalakes/m1/catalogs/c1/schemas/s1/objects",
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["objects"], json!(["o1"]));

    let (status, described) = send(
        &router,
        "GET",
        "/api/v1/metalakes/m1/catalogs/c1/schemas/s1/objects/o1/describe",
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(described["properties"]["format"], "parquet");

    // Tear down bottom-up and verify the soft-deleted record is held.
    for uri in [
        "/api/v1/metalakes/m1/catalogs/c1/schemas/s1/objects/o1",
        "/api/v1/metalakes/m1/catalogs/c1/schemas/s1",
        "/api/v1/metalakes/m1/catalogs/c1",
    ] {
        let (status, dropped) = send(&router, "DELETE", uri, None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(dropped["state"], "deleted", "{uri}");
    }

    let (status, _) = send(&router, "GET", "/api/v1/metalakes/m1/catalogs/c1", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, held) = send(
        &router,
        "GET",
        "/api/v1/metalakes/m1/catalogs/c1?include_deleted=true",
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(held["state"], "deleted");
    Ok(())
}

#[tokio::test]
async fn stale_alter_maps_to_conflict() -> Result<()> {
    let router = test_router();

    send(&router, "POST", "/api/v1/metalakes", Some(json!({"name": "m1"}))).await?;

    let alter = json!({
        "expectedVersion": 1,
        "changes": [{"type": "set_property", "key": "owner", "value": "team-a"}]
    });
    let (status, altered) = send(&router, "PUT", "/api/v1/metalakes/m1", Some(alter.clone())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(altered["version"], 2);

    let (status, body) = send(&router, "PUT", "/api/v1/metalakes/m1", Some(alter)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "VERSION_CONFLICT");
    Ok(())
}

#[tokio::test]
async fn non_empty_drop_is_rejected() -> Result<()> {
    let router = test_router();

    send(&router, "POST", "/api/v1/metalakes", Some(json!({"name": "m1"}))).await?;
    send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs",
        Some(json!({"name": "c1", "providerType": "memory"})),
    )
    .await?;

    let (status, body) = send(&router, "DELETE", "/api/v1/metalakes/m1", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn connection_probe_validates_without_creating() -> Result<()> {
    let router = test_router();

    send(&router, "POST", "/api/v1/metalakes", Some(json!({"name": "m1"}))).await?;

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs/test-connection",
        Some(json!({"name": "c1", "providerType": "memory"})),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/metalakes/m1/catalogs/test-connection",
        Some(json!({"name": "c1", "providerType": "no-such-provider"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_SUPPORTED");

    // Neither probe left a catalog behind.
    let (status, listed) = send(&router, "GET", "/api/v1/metalakes/m1/catalogs", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["catalogs"], json!([]));
    Ok(())
}

#[tokio::test]
async fn rename_preserves_identity_over_http() -> Result<()> {
    let router = test_router();

    let (_, created) = send(&router, "POST", "/api/v1/metalakes", Some(json!({"name": "m1"}))).await?;

    let (status, renamed) = send(
        &router,
        "PUT",
        "/api/v1/metalakes/m1",
        Some(json!({"changes": [{"type": "rename", "new_name": "m2"}]})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "m2");
    assert_eq!(renamed["id"], created["id"]);

    let (status, _) = send(&router, "GET", "/api/v1/metalakes/m1", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, loaded) = send(&router, "GET", "/api/v1/metalakes/m2", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["version"], 2);
    Ok(())
}
