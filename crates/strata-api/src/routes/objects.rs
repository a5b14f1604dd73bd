//! Object API routes.
//!
//! Objects are the provider-native leaf units (tables, filesets, topics).
//! Mutations reach both sides; `describe` fetches live remote detail.
//!
//! ## Routes
//!
//! - `POST   .../schemas/{s}/objects` - Create an object on both sides
//! - `GET    .../schemas/{s}/objects` - List object names from the provider
//! - `GET    .../schemas/{s}/objects/{o}` - Load the local object record
//! - `GET    .../schemas/{s}/objects/{o}/describe` - Live remote detail
//! - `PUT    .../schemas/{s}/objects/{o}` - Alter an object on both sides
//! - `DELETE .../schemas/{s}/objects/{o}` - Drop an object on both sides

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use strata_core::{EntityIdent, EntityPayload, ObjectKind};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::routes::dto::{AlterRequest, EntityEnvelope, IncludeDeletedQuery, VersionedJson};
use crate::server::AppState;

/// Request to create an object.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateObjectRequest {
    /// Object name (unique within the schema).
    pub name: String,
    /// The provider-native unit kind.
    #[schema(value_type = String, example = "table")]
    pub kind: ObjectKind,
    /// Optional description.
    pub comment: Option<String>,
    /// Free-form string properties, forwarded to the provider.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Object response: the shared envelope plus the object kind.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResponse {
    /// The provider-native unit kind.
    #[schema(value_type = String, example = "table")]
    pub kind: ObjectKind,
    /// Shared entity fields.
    #[serde(flatten)]
    pub entity: EntityEnvelope,
}

impl ObjectResponse {
    fn from_entity(entity: &strata_core::Entity) -> Self {
        let kind = match &entity.payload {
            EntityPayload::Object { object_kind, .. } => *object_kind,
            _ => ObjectKind::Table,
        };
        Self {
            kind,
            entity: EntityEnvelope::from(entity),
        }
    }
}

/// List objects response; names come from the live provider.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsResponse {
    /// Object names present on the remote side.
    pub objects: Vec<String>,
}

/// Live remote detail for one object.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescribeObjectResponse {
    /// Leaf name on the remote side.
    pub name: String,
    /// The provider-native unit kind.
    #[schema(value_type = String, example = "table")]
    pub kind: ObjectKind,
    /// Provider-side properties.
    pub properties: BTreeMap<String, String>,
}

/// Creates object routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/metalakes/:metalake/catalogs/:catalog/schemas/:schema/objects",
            post(create_object).get(list_objects),
        )
        .route(
            "/metalakes/:metalake/catalogs/:catalog/schemas/:schema/objects/:object",
            get(load_object).put(alter_object).delete(drop_object),
        )
        .route(
            "/metalakes/:metalake/catalogs/:catalog/schemas/:schema/objects/:object/describe",
            get(describe_object),
        )
}

/// Create an object on the remote provider and in the local store.
#[utoipa::path(
    post,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
    ),
    request_body = CreateObjectRequest,
    responses(
        (status = 201, description = "Object created", body = ObjectResponse),
        (status = 404, description = "Parent not found", body = ApiErrorBody),
        (status = 409, description = "Identifier occupied", body = ApiErrorBody),
        (status = 500, description = "Partial failure", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn create_object(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema)): Path<(String, String, String)>,
    Json(req): Json<CreateObjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        principal = %ctx.principal,
        metalake = %metalake,
        catalog = %catalog,
        schema = %schema,
        object = %req.name,
        kind = %req.kind,
        "Creating object"
    );

    let ident = EntityIdent::object_of(&metalake, &catalog, &schema, &req.name)?;
    let created = state
        .engine
        .create_object(&ident, req.kind, req.comment, req.properties, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::CREATED,
        ObjectResponse::from_entity(&created),
    ))
}

/// List object names from the schema's provider (remote truth).
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
    ),
    responses(
        (status = 200, description = "Objects listed", body = ListObjectsResponse),
        (status = 404, description = "Schema not found", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_objects(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::schema_of(&metalake, &catalog, &schema)?;
    let objects = state
        .engine
        .list_objects(&ident)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?
        .into_iter()
        .map(|name| name.as_str().to_string())
        .collect();

    Ok(VersionedJson(
        StatusCode::OK,
        ListObjectsResponse { objects },
    ))
}

/// Load the local object record.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects/{object}",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
        ("object" = String, Path, description = "Object name"),
        IncludeDeletedQuery,
    ),
    responses(
        (status = 200, description = "Object found", body = ObjectResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn load_object(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema, object)): Path<(String, String, String, String)>,
    Query(query): Query<IncludeDeletedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::object_of(&metalake, &catalog, &schema, &object)?;
    let entity = state
        .engine
        .load_object(&ident, query.include_deleted)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        ObjectResponse::from_entity(&entity),
    ))
}

/// Fetch live remote detail for an object.
#[utoipa::path(
    get,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects/{object}/describe",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
        ("object" = String, Path, description = "Object name"),
    ),
    responses(
        (status = 200, description = "Remote detail", body = DescribeObjectResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn describe_object(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema, object)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let ident = EntityIdent::object_of(&metalake, &catalog, &schema, &object)?;
    let summary = state
        .engine
        .describe_object(&ident)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        DescribeObjectResponse {
            name: summary.name.as_str().to_string(),
            kind: summary.kind,
            properties: summary.properties,
        },
    ))
}

/// Alter an object on both sides.
#[utoipa::path(
    put,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects/{object}",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
        ("object" = String, Path, description = "Object name"),
    ),
    request_body = AlterRequest,
    responses(
        (status = 200, description = "Object altered", body = ObjectResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Version conflict", body = ApiErrorBody),
        (status = 502, description = "Remote unavailable", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn alter_object(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema, object)): Path<(String, String, String, String)>,
    Json(req): Json<AlterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, schema = %schema, object = %object, "Altering object");

    let ident = EntityIdent::object_of(&metalake, &catalog, &schema, &object)?;
    let expected_version = req.expected_version;
    let changes = req.into_changes()?;
    let altered = state
        .engine
        .alter_object(&ident, &changes, expected_version, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        ObjectResponse::from_entity(&altered),
    ))
}

/// Drop an object on both sides (local soft delete first).
#[utoipa::path(
    delete,
    path = "/api/v1/metalakes/{metalake}/catalogs/{catalog}/schemas/{schema}/objects/{object}",
    tag = "objects",
    params(
        ("metalake" = String, Path, description = "Metalake name"),
        ("catalog" = String, Path, description = "Catalog name"),
        ("schema" = String, Path, description = "Schema name"),
        ("object" = String, Path, description = "Object name"),
    ),
    responses(
        (status = 200, description = "Object dropped", body = ObjectResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 500, description = "Partial failure", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn drop_object(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Path((metalake, catalog, schema, object)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(principal = %ctx.principal, metalake = %metalake, catalog = %catalog, schema = %schema, object = %object, "Dropping object");

    let ident = EntityIdent::object_of(&metalake, &catalog, &schema, &object)?;
    let dropped = state
        .engine
        .drop_object(&ident, &ctx.principal)
        .await
        .map_err(|err| ApiError::from(err).with_request_id(&ctx.request_id))?;

    Ok(VersionedJson(
        StatusCode::OK,
        ObjectResponse::from_entity(&dropped),
    ))
}
