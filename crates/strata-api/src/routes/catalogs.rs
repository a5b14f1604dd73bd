//! Catalog API routes.
//!
//! Catalogs bind a metalake to a remote provider. Creation probes the
//! provider connection first; a failed probe leaves no record behind.
//!
//! ## Routes
//!
//! - `POST   /metalakes/{m}/catalogs` - Create a catalog
//! - `POST   /metalakes/{m}/catalogs/test-connection` - Probe a configuration
//! - `GET    /metalakes/{m}/catalogs` - List catalogs
//! - `GET    /metalakes/{m}/catalogs/{c}` - Load a catalog
//! - `PUT    /metalakes/{m}/catalogs/{c}` - Alter a catalog
//! - `DELETE /metalakes/{m}/catalogs/{c}` - Drop a catalog

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use strata_core::{EntityIdent, EntityPayload};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::routes::dto::{AlterRequest, EntityEnvelope, IncludeDeletedQuery, VersionedJson};
use crate::server::AppState;

/// Request to create a catalog.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCatalogRequest {
    /// Catalog name (unique within the metalake).
    pub name: String,
    /// Provider type the catalog binds to (e.g. `memory`).
    pub provider_type: String,
    /// Optional description.
    pub comment: Option<String>,
    /// Provider connection properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Request to probe a provider configuration without creating anything.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    /// Catalog name the configuration would be created under.
    pub name: String,
    /// Provider type to probe.
    pub provider_type: String,
    /// Provider connection properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Catalog response: the shared envelope plus the bound provider type.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    /// Provider type the catalog is bound to.
    pub provider_type: String,
    /// Shared entity fields.
    #[serde(flatten)]
    pub entity: EntityEnvelope,
}

impl CatalogResponse {
    fn from_entity(entity: &strata_core::Entity) -> Self {
        let provider_type = match &entity.payload {
            EntityPayload::Catalog { provider_type, .. } => provider_type.clone(),
            _ => String::new(),
        };
        Self {
            provider_type,
            entity: EntityEnvelope::from(entity),
        }
    }
}

/// List catalogs response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListCatalogsResponse {
    /// Catalogs in the metalake.
    pub catalogs: Vec<CatalogResponse>,
}

/// Creates catalog routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/metalakes/:metalake/catalogs",
            post(create_catalog).get(list_catalogs),
        )
        .route(
            "/metalakes/:metalake/catalogs/test-connection",
            post(test_connection),
        )
        .route(
            "/metalakes/:metalake/catalogs/:catalog",
            get(load_catalog).put(alter_catalog).delete(drop_catalog),
        )
}

/// Create a catalog bound to a provider.
#[utoipa::path(
    post,
    path = "/api/v1/metalakes/{metalake}/catalogs",
    tag = "catalogs",
    params(("metalake" = String, Path, description = "Metalake name")),
    request_body = CreateCatalogRequest,
    responses(
        (status = 201, description = "Catalog created", body = CatalogResponse),
        (status = 400, description = "Bad request or unknown provider type", body = ApiErrorBody),
        (status = 409, description = "Identifier occupied", body = ApiErrorBody),
        (status = 502, description = "Connection probe failed", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn create_catalog(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
    Json(req): Json<CreateCatalogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        principal = %ctx.principal,
        metalake = %metalake,
        catalog = %req.name,
        provider_type = %req.provider_type,
        "Creating catalog"
    );

    let ident = EntityIdent::catalog_of(&metalake, &req.name)?;
    let created = state
        .engine
        .create_catalog(
            &ident,
            &req.provider_type,
            req.comment,
            req.properties,
            &ctx.principal,
        )
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::CREATED,
        CatalogResponse::from_entity(&created),
    ))
}

/// Probe a provider configuration without creating a catalog.
#[utoipa::path(
    post,
    path = "/api/v1/metalakes/{metalake}/catalogs/test-connection",
    tag = "catalogs",
    params(("metalake" = String, Path, description = "Metalake name")),
    request_body = TestConnectionRequest,
    responses(
        (status = 204, description = "Connection probe succeeded"),
        (status = 400, description = "Unknown provider type", body = ApiErrorBody),
        (status = 502, description = "Connection probe failed", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn test_connection(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
    Json(req): Json<TestConnectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        principal = %ctx.principal,
        metalake = %metalake,
        provider_type = %req.provider_type,
        "Probing provider connection"
    );

    let ident = EntityIdent::catalog_of(&metalake, &req.name)?;
    state
        .engine
        .test_catalog_connection(&ident, &req.provider_type, req.properties)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(StatusCode::NO_CONTENT)
}

/// List catalogs in a metalake.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs",
    tag = "catalogs",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        IncludeDeletedQuery,
    ),
    responses(
        (status = 200, description = "Catalogs listed", body = ListCatalogsResponse),
        (status = 404, description = "Metalake not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_catalogs(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::metalake_of(&metalake)?;
    let catalogs = state
        .engine
        .list_catalogs(&ident, query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?
        .iter()
        .map(CatalogResponse::from_entity)
        .collect();

    Ok(VersionedJson(
        StatusCode::OK,
        ListCatalogsResponse { catalogs },
    ))
}

/// Load a catalog.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}",
    tag = "catalogs",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        IncludeDeletedQuery,
    ),
    responses(
        (status = 200, description = "Catalog found", body = CatalogResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn load_catalog(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog)): Path<(String, String)>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::catalog_of(&metalake, &catalog)?;
    let entity = state
        .engine
        .load_catalog(&ident, query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        CatalogResponse::from_entity(&entity),
    ))
}

/// Alter a catalog.
#[utoipa::path(
    put,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}",
    tag = "catalogs",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
    ),
    request_body = AlterRequest,
    responses(
        (status = 200, description = "Catalog altered", body = CatalogResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Version conflict", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn alter_catalog(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog)): Path<(String, String)>,
    Json(req): Json<AlterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, "Altering catalog");

    let ident = EntityIdent::catalog_of(&metalake, &catalog)?;
    let expected_version = req.expected_version;
    let changes = req.into_changes()?;
    let altered = state
        .engine
        .alter_catalog(&ident, &changes, expected_version, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        CatalogResponse::from_entity(&altered),
    ))
}

/// Drop a catalog (soft delete) and release its provider binding.
#[utoipa::path(
    delete,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}",
    tag = "catalogs",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
    ),
    responses(
        (status = 200, description = "Catalog dropped", body = CatalogResponse),
        (status = 400, description = "Catalog not empty", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn drop_catalog(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, "Dropping catalog");

    let ident = EntityIdent::catalog_of(&metalake, &catalog)?;
    let dropped = state
        .engine
        .drop_catalog(&ident, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        CatalogResponse::from_entity(&dropped),
    ))
}
