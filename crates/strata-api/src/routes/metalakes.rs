//! Metalake API routes.
//!
//! ## Routes
//!
//! - `POST   /metalakes` - Create a metalake
//! - `GET    /metalakes` - List metalakes
//! - `GET    /metalakes/{metalake}` - Load a metalake
//! - `PUT    /metalakes/{metalake}` - Alter a metalake
//! - `DELETE /metalakes/{metalake}` - Drop a metalake

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

/// Request to create a metalake.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetalakeRequest {
    /// Metalake name (globally unique).
    pub name: String,
    /// Optional description.
    pub comment: Option<String>,
    /// Free-form string properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// List metalakes response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListMetalakesResponse {
    /// All metalakes visible to the caller.
    pub metalakes: Vec<EntityEnvelope>,
}

/// Creates metalake routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metalakes", post(create_metalake).get(list_metalakes))
        .route(
            "/metalakes/:metalake",
            get(load_metalake).put(alter_metalake).delete(drop_metalake),
        )
}

/// Create a metalake.
#[utoipa::path(
    post,
    path = "/api/v1/metalakes",
    tag = "metalakes",
    request_body = CreateMetalakeRequest,
    responses(
        (status = 201, description = "Metalake created", body = EntityEnvelope),
        (status = 400, description = "Bad request", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 409, description = "Identifier occupied", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn create_metalake(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMetalakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %req.name, "Creating metalake");

    let ident = EntityIdent::metalake_of(&req.name)?;
    let created = state
        .engine
        .create_metalake(&ident, req.comment, req.properties, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::CREATED,
        EntityEnvelope::from(&created),
    ))
}

/// List metalakes.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes",
    tag = "metalakes",
    params(IncludeDeletedQuery),
    responses(
        (status = 200, description = "Metalakes listed", body = ListMetalakesResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_metalakes(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metalakes = state
        .engine
        .list_metalakes(query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?
        .iter()
        .map(EntityEnvelope::from)
        .collect();

    Ok(VersionedJson(
        StatusCode::OK,
        ListMetalakesResponse { metalakes },
    ))
}

/// Load a metalake.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}",
    tag = "metalakes",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        IncludeDeletedQuery,
    ),
    responses(
        (status = 200, description = "Metalake found", body = EntityEnvelope),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn load_metalake(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::metalake_of(&metalake)?;
    let entity = state
        .engine
        .load_metalake(&ident, query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&entity)))
}

/// Alter a metalake.
#[utoipa::path(
    put,
    path = "/api/v1/metalakes/{metalake}",
    tag = "metalakes",
    params(("metalake" = String, Path, description = "Metalake name")),
    request_body = AlterRequest,
    responses(
        (status = 200, description = "Metalake altered", body = EntityEnvelope),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Version conflict", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn alter_metalake(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
    Json(req): Json<AlterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, "Altering metalake");

    let ident = EntityIdent::metalake_of(&metalake)?;
    let expected_version = req.expected_version;
    let changes = req.into_changes()?;
    let altered = state
        .engine
        .alter_metalake(&ident, &changes, expected_version, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&altered)))
}

/// Drop a metalake (soft delete).
#[utoipa::path(
    delete,
    path = "/api/v1/metalakes/{metalake}",
    tag = "metalakes",
    params(("metalake" = String, Path, description = "Metalake name")),
    responses(
        (status = 200, description = "Metalake dropped", body = EntityEnvelope),
        (status = 400, description = "Metalake not empty", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn drop_metalake(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path(metalake): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, "Dropping metalake");

    let ident = EntityIdent::metalake_of(&metalake)?;
    let dropped = state
        .engine
        .drop_metalake(&ident, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(StatusCode::OK, EntityEnvelope::from(&dropped)))
}
