//! API server implementation.
//!
//! Provides health, ready, and API endpoints for the Strata catalog.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strata_core::Result;
use strata_federation::{FederationEngine, spawn_maintenance};
use strata_provider::{MemoryProviderFactory, ProviderFactory, ProviderRegistry};
use strata_store::{KvEntityStore, MemoryBackend};

use crate::config::{Config, CorsConfig};

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The federation engine backing every entity route.
    pub engine: Arc<FederationEngine>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("engine", &"<FederationEngine>")
            .finish()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK once the entity store answers a read. A root-level list
/// is sufficient to validate the storage path.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.list_metalakes(false).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("entity store check failed: {e}")),
            }),
        ),
    }
}

/// Serves the generated `OpenAPI` document.
async fn serve_openapi() -> impl IntoResponse {
    Json(crate::openapi::openapi())
}

// ============================================================================
// Server
// ============================================================================

/// The Strata API server.
pub struct Server {
    config: Config,
    engine: Arc<FederationEngine>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("engine", &"<FederationEngine>")
            .finish()
    }
}

impl Server {
    /// Creates a server over an in-memory entity store with the built-in
    /// `memory` provider registered. Intended for tests and local
    /// development; production wiring uses [`Server::with_engine`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = Arc::new(KvEntityStore::with_retention(
            Arc::new(MemoryBackend::new()),
            config.retention(),
        ));
        let registry = Arc::new(ProviderRegistry::new());
        if let Err(err) =
            registry.register(Arc::new(MemoryProviderFactory::new()) as Arc<dyn ProviderFactory>)
        {
            tracing::error!(error = %err, "Failed to register the memory provider factory");
        }
        let engine = Arc::new(FederationEngine::with_config(
            store,
            registry,
            config.engine_config(),
        ));
        Self { config, engine }
    }

    /// Creates a server over an explicit engine.
    #[must_use]
    pub fn with_engine(config: Config, engine: Arc<FederationEngine>) -> Self {
        Self { config, engine }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the federation engine.
    #[must_use]
    pub fn engine(&self) -> Arc<FederationEngine> {
        Arc::clone(&self.engine)
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            engine: Arc::clone(&self.engine),
        });

        let cors = self.build_cors_layer();
        let auth_layer =
            middleware::from_fn_with_state(Arc::clone(&state), crate::context::auth_middleware);

        Router::new()
            // Health, ready, and the OpenAPI document (no auth required)
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/api/v1/openapi.json", get(serve_openapi))
            // API routes (auth via RequestContext extractor)
            .nest("/api/v1", crate::routes::api_v1_routes().layer(auth_layer))
            // Middleware (order matters): trace outermost, then CORS.
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = Self::build_cors_base(cors_config);
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn build_cors_base(cors_config: &CorsConfig) -> CorsLayer {
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static("x-principal"),
                header::HeaderName::from_static("x-request-id"),
                header::HeaderName::from_static("idempotency-key"),
            ])
            .expose_headers([
                header::CONTENT_TYPE,
                header::CONTENT_LENGTH,
                header::RETRY_AFTER,
                header::HeaderName::from_static("x-request-id"),
            ])
            .max_age(Duration::from_secs(cors_config.max_age_seconds))
    }

    fn cors_allows_any_origin(cors_config: &CorsConfig) -> bool {
        cors_config.allowed_origins.len() == 1
            && cors_config
                .allowed_origins
                .first()
                .is_some_and(|origin| origin == "*")
    }

    fn parse_cors_origins(cors_config: &CorsConfig) -> Vec<HeaderValue> {
        let mut allowed = Vec::new();
        for origin in &cors_config.allowed_origins {
            match HeaderValue::from_str(origin) {
                Ok(value) => allowed.push(value),
                Err(_) => {
                    tracing::error!(
                        origin = %origin,
                        "Invalid CORS origin; expected a valid HeaderValue"
                    );
                }
            }
        }
        allowed
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if Self::cors_allows_any_origin(cors_config) {
            return cors.allow_origin(Any);
        }

        if cors_config
            .allowed_origins
            .iter()
            .any(|origin| origin == "*")
        {
            tracing::error!(
                origins = ?cors_config.allowed_origins,
                "Invalid CORS config: '*' must be the only allowed origin"
            );
            return cors;
        }

        let allowed = Self::parse_cors_origins(cors_config);

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// Rebinds providers for catalogs already in the store, spawns the
    /// background purge loop, then serves requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the port
    /// cannot be bound.
    pub async fn serve(&self) -> Result<()> {
        self.validate_config()?;

        strata_federation::metrics::register_metrics();

        let rebound = self.engine.rebind_catalogs().await?;
        if rebound > 0 {
            tracing::info!(rebound, "Restored provider bindings from the store");
        }
        let maintenance = spawn_maintenance(Arc::clone(&self.engine));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(http_port = self.config.http_port, "Starting Strata API server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| strata_core::Error::internal(format!("failed to bind to {addr}: {e}")))?;

        let served = axum::serve(listener, router)
            .await
            .map_err(|e| strata_core::Error::internal(format!("server error: {e}")));

        maintenance.abort();
        self.engine.shutdown().await?;
        served
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to exercise
    /// the routes without binding to a port.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }

    fn validate_config(&self) -> Result<()> {
        // No CORS wildcard outside debug.
        if !self.config.debug
            && self
                .config
                .cors
                .allowed_origins
                .iter()
                .any(|origin| origin == "*")
        {
            return Err(strata_core::Error::validation(
                "cors.allowed_origins cannot include '*' when debug=false",
            ));
        }

        // Exactly one JWT verification key outside debug.
        if !self.config.debug {
            let has_hs256_secret = self.config.jwt.hs256_secret.is_some();
            let has_rs256_public_key = self.config.jwt.rs256_public_key_pem.is_some();

            if !has_hs256_secret && !has_rs256_public_key {
                return Err(strata_core::Error::validation(
                    "jwt.hs256_secret or jwt.rs256_public_key_pem is required when debug=false",
                ));
            }
            if has_hs256_secret && has_rs256_public_key {
                return Err(strata_core::Error::validation(
                    "jwt.hs256_secret and jwt.rs256_public_key_pem are mutually exclusive",
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn debug_server() -> Server {
        Server::new(Config::default())
    }

    #[tokio::test]
    async fn test_health_endpoint() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_ready_endpoint() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let ready: ReadyResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert!(ready.ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_requires_auth() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/api/v1/metalakes")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_debug_principal_header_creates_metalake() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/metalakes")
            .header("content-type", "application/json")
            .header("x-principal", "alice")
            .body(Body::from(r#"{"name": "m1", "comment": "lake"}"#))
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some(crate::routes::dto::MEDIA_TYPE)
        );
        assert!(response.headers().get("x-request-id").is_some());

        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .context("read response body")?;
        let created: serde_json::Value = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(created["name"], "m1");
        assert_eq!(created["version"], 1);
        assert_eq!(created["state"], "active");
        assert_eq!(created["audit"]["creator"], "alice");
        Ok(())
    }

    #[tokio::test]
    async fn test_openapi_endpoint_is_public() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/api/v1/openapi.json")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .context("read response body")?;
        let text = String::from_utf8(body.to_vec()).context("decode response body")?;
        assert!(text.contains("Strata API"));
        Ok(())
    }

    #[test]
    fn production_config_requires_one_jwt_key() {
        let mut config = Config::default();
        config.debug = false;
        let server = Server::new(config.clone());
        assert!(server.validate_config().is_err());

        config.jwt.hs256_secret = Some("secret".to_string());
        let server = Server::new(config.clone());
        assert!(server.validate_config().is_ok());

        config.jwt.rs256_public_key_pem = Some("pem".to_string());
        let server = Server::new(config);
        assert!(server.validate_config().is_err());
    }

    #[test]
    fn production_config_rejects_cors_wildcard() {
        let mut config = Config::default();
        config.debug = false;
        config.jwt.hs256_secret = Some("secret".to_string());
        config.cors.allowed_origins = vec!["*".to_string()];
        let server = Server::new(config);
        assert!(server.validate_config().is_err());
    }
}
