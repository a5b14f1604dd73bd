//! HTTP route handlers.

pub mod catalogs;
pub mod dto;
pub mod metalakes;
pub mod objects;
pub mod schemas;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// `/api/v1` routes (authenticated).
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(metalakes::routes())
        .merge(catalogs::routes())
        .merge(schemas::routes())
        .merge(objects::routes())
}
