//! Schema API routes.
//!
//! Schema mutations reach both the local store and the catalog's remote
//! provider; the list operation reflects the remote side (live truth).
//!
//! ## Routes
//!
//! - `POST   .../catalogs/{c}/schemas` - Create a schema on both sides
//! - `GET    .../catalogs/{c}/schemas` - List schema names from the provider
//! - `GET    .../catalogs/{c}/schemas/{s}` - Load the local schema record
//! - `PUT    .../catalogs/{c}/schemas/{s}` - Alter a schema on both sides
//! - `DELETE .../catalogs/{c}/schemas/{s}` - Drop a schema on both sides

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use strata_core::EntityIdent;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::routes::dto::{AlterRequest, EntityEnvelope, IncludeDeletedQuery, VersionedJson};
use crate::server::AppState;

/// Request to create a schema.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchemaRequest {
    /// Schema name (unique within the catalog).
    pub name: String,
    /// Optional description.
    pub comment: Option<String>,
    /// Free-form string properties, forwarded to the provider.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// List schemas response; names come from the live provider.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListSchemasResponse {
    /// Schema names present on the remote side.
    pub schemas: Vec<String>,
}

/// Creates schema routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/metalakes/:metalake/catalogs/:catalog/schemas",
            post(create_schema).get(list_schemas),
        )
        .route(
            "/metalakes/:metalake/catalogs/:catalog/schemas/:schema",
            get(load_schema).put(alter_schema).delete(drop_schema),
        )
}

/// Create a schema on the remote provider and in the local store.
#[utoipa::path(
    post,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas",
    tag = "schemas",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
    ),
    request_body = CreateSchemaRequest,
    responses(
        (status = 201, description = "Schema created", body = EntityEnvelope),
        (status = 404, description = "Parent not found", body = ApiErrorBody),
        (status = 409, description = "Identifier occupied", body = ApiErrorBody),
        (status = 500, description = "Partial failure", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn create_schema(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog)): Path<(String, String)>,
    Json(req): Json<CreateSchemaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        principal = %ctx.principal,
        metalake = %metalake,
        catalog = %catalog,
        schema = %req.name,
        "Creating schema"
    );

    let ident = EntityIdent::schema_of(&metalake, &catalog, &req.name)?;
    let created = state
        .engine
        .create_schema(&ident, req.comment, req.properties, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::CREATED,
        EntityEnvelope::from(&created),
    ))
}

/// List schema names from the catalog's provider (remote truth).
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas",
    tag = "schemas",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
    ),
    responses(
        (status = 200, description = "Schemas listed", body = ListSchemasResponse),
        (status = 404, description = "Catalog not found", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_schemas(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::catalog_of(&metalake, &catalog)?;
    let schemas = state
        .engine
        .list_schemas(&ident)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?
        .into_iter()
        .map(|name| name.as_str().to_string())
        .collect();

    Ok(VersionedJson(
        StatusCode::OK,
        ListSchemasResponse { schemas },
    ))
}

/// Load the local schema record.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}",
    tag = "schemas",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
        IncludeDeletedQuery,
    ),
    responses(
        (status = 200, description = "Schema found", body = EntityEnvelope),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn load_schema(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema)): Path<(String, String, String)>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::schema_of(&metalake, &catalog, &schema)?;
    let entity = state
        .engine
        .load_schema(&ident, query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&entity)))
}

/// Alter a schema on both sides.
#[utoipa::path(
    put,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}",
    tag = "schemas",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
    ),
    request_body = AlterRequest,
    responses(
        (status = 200, description = "Schema altered", body = EntityEnvelope),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Version conflict", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn alter_schema(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema)): Path<(String, String, String)>,
    Json(req): Json<AlterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, schema = %schema, "Altering schema");

    let ident = EntityIdent::schema_of(&metalake, &catalog, &schema)?;
    let expected_version = req.expected_version;
    let changes = req.into_changes()?;
    let altered = state
        .engine
        .alter_schema(&ident, &changes, expected_version, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&altered)))
}

/// Drop a schema on both sides (local soft delete first).
#[utoipa::path(
    delete,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}",
    tag = "schemas",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
    ),
    responses(
        (status = 200, description = "Schema dropped", body = EntityEnvelope),
        (status = 400, description = "Schema not empty", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 500, description = "Partial failure", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn drop_schema(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, schema = %schema, "Dropping schema");

    let ident = EntityIdent::schema_of(&metalake, &catalog, &schema)?;
    let dropped = state
        .engine
        .drop_schema(&ident, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&dropped)))
}
