//! `OpenAPI` (3.1) specification generation for `strata-api`.
//!
//! The generated document is served at `/api/v1/openapi.json` and is used
//! to generate external clients and detect breaking API changes.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// `OpenAPI` documentation for the Strata REST API (`/api/v1/*`).
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Strata API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Strata federated metadata catalog REST API"
    ),
    paths(
        crate::routes::metalakes::create_metalake,
        crate::routes::metalakes::list_metalakes,
        crate::routes::metalakes::load_metalake,
        crate::routes::metalakes::alter_metalake,
        crate::routes::metalakes::drop_metalake,
        crate::routes::catalogs::create_catalog,
        crate::routes::catalogs::test_connection,
        crate::routes::catalogs::list_catalogs,
        crate::routes::catalogs::load_catalog,
        crate::routes::catalogs::alter_catalog,
        crate::routes::catalogs::drop_catalog,
        crate::routes::schemas::create_schema,
        crate::routes::schemas::list_schemas,
        crate::routes::schemas::load_schema,
        crate::routes::schemas::alter_schema,
        crate::routes::schemas::drop_schema,
        crate::routes::objects::create_object,
        crate::routes::objects::list_objects,
        crate::routes::objects::load_object,
        crate::routes::objects::describe_object,
        crate::routes::objects::alter_object,
        crate::routes::objects::drop_object,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::routes::dto::AuditResponse,
            crate::routes::dto::StateResponse,
            crate::routes::dto::EntityEnvelope,
            crate::routes::dto::ChangeRequest,
            crate::routes::dto::AlterRequest,
            crate::routes::metalakes::CreateMetalakeRequest,
            crate::routes::metalakes::ListMetalakesResponse,
            crate::routes::catalogs::CreateCatalogRequest,
            crate::routes::catalogs::TestConnectionRequest,
            crate::routes::catalogs::CatalogResponse,
            crate::routes::catalogs::ListCatalogsResponse,
            crate::routes::schemas::CreateSchemaRequest,
            crate::routes::schemas::ListSchemasResponse,
            crate::routes::objects::CreateObjectRequest,
            crate::routes::objects::ObjectResponse,
            crate::routes::objects::ListObjectsResponse,
            crate::routes::objects::DescribeObjectResponse,
        )
    ),
    tags(
        (name = "metalakes", description = "Metalake operations"),
        (name = "catalogs", description = "Catalog operations and connection probes"),
        (name = "schemas", description = "Schema operations (two-system)"),
        (name = "objects", description = "Object operations (two-system)"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_all_hierarchy_levels() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/metalakes"));
        assert!(paths.iter().any(|p| p.contains("/catalogs/test-connection")));
        assert!(paths.iter().any(|p| p.contains("/objects/{object}/describe")));
    }

    #[test]
    fn document_serializes_to_json() {
        let json = openapi_json().unwrap();
        assert!(json.contains("Strata API"));
        assert!(json.contains("bearerAuth"));
    }
}
