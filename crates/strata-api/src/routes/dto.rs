//! Request and response building blocks shared across the entity routes.

use std::collections::BTreeMap;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use strata_core::{Entity, EntityChange, EntityState, Name};

use crate::error::ApiError;

/// Versioned media type for response bodies.
pub const MEDIA_TYPE: &str = "application/vnd.strata.v1+json";

/// JSON response tagged with the versioned media type.
///
/// Requests are accepted with either `application/json` or the versioned
/// type (axum's `Json` extractor takes any `*+json`); responses always
/// declare the versioned type.
#[derive(Debug)]
pub struct VersionedJson<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for VersionedJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => {
                let mut response = (self.0, body).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(MEDIA_TYPE),
                );
                response
            }
            Err(err) => ApiError::internal(format!("response serialization failed: {err}"))
                .into_response(),
        }
    }
}

/// Audit trail fields carried on every entity response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    /// Principal that created the entity.
    pub creator: String,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Principal of the last mutation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modifier: Option<String>,
    /// Timestamp of the last mutation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl From<&strata_core::AuditInfo> for AuditResponse {
    fn from(audit: &strata_core::AuditInfo) -> Self {
        Self {
            creator: audit.creator.clone(),
            create_time: audit.create_time,
            last_modifier: audit.last_modifier.clone(),
            last_modified_time: audit.last_modified_time,
        }
    }
}

/// Lifecycle state on an entity response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    /// `active` or `deleted`.
    pub state: String,
    /// When the soft delete happened, for deleted entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&EntityState> for StateResponse {
    fn from(state: &EntityState) -> Self {
        match state {
            EntityState::Active => Self {
                state: "active".to_string(),
                deleted_at: None,
            },
            EntityState::Deleted { deleted_at } => Self {
                state: "deleted".to_string(),
                deleted_at: Some(*deleted_at),
            },
        }
    }
}

/// Envelope fields shared by all entity responses.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityEnvelope {
    /// Surrogate ID, stable across renames.
    pub id: String,
    /// Leaf name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Free-form string properties.
    pub properties: BTreeMap<String, String>,
    /// Optimistic-concurrency version, starts at 1.
    pub version: u64,
    /// Lifecycle state.
    #[serde(flatten)]
    pub state: StateResponse,
    /// Audit trail.
    pub audit: AuditResponse,
}

impl From<&Entity> for EntityEnvelope {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.to_string(),
            name: entity.ident.name.as_str().to_string(),
            comment: entity.payload.comment().map(str::to_string),
            properties: entity.properties.clone(),
            version: entity.version,
            state: StateResponse::from(&entity.state),
            audit: AuditResponse::from(&entity.audit),
        }
    }
}

/// One change in an alter request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeRequest {
    /// Sets (or overwrites) one property.
    SetProperty {
        /// Property key.
        key: String,
        /// Property value.
        value: String,
    },
    /// Removes one property; absent keys are ignored.
    RemoveProperty {
        /// Property key.
        key: String,
    },
    /// Replaces the comment.
    UpdateComment {
        /// The new comment; `null` clears it.
        comment: Option<String>,
    },
    /// Renames the entity in place, preserving its ID.
    Rename {
        /// The new leaf name.
        new_name: String,
    },
}

impl ChangeRequest {
    /// Converts the wire change into the domain change.
    ///
    /// # Errors
    ///
    /// Returns a 400 when a rename target is not a valid name.
    pub fn into_change(self) -> Result<EntityChange, ApiError> {
        Ok(match self {
            Self::SetProperty { key, value } => EntityChange::SetProperty { key, value },
            Self::RemoveProperty { key } => EntityChange::RemoveProperty { key },
            Self::UpdateComment { comment } => EntityChange::UpdateComment { comment },
            Self::Rename { new_name } => EntityChange::Rename {
                new_name: Name::new(new_name).map_err(ApiError::from)?,
            },
        })
    }
}

/// Alter (PUT) request body shared by all entity kinds.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlterRequest {
    /// Fails with 409 when the stored version differs; omit for
    /// last-writer-wins under the path lock.
    pub expected_version: Option<u64>,
    /// Changes applied in order.
    pub changes: Vec<ChangeRequest>,
}

impl AlterRequest {
    /// Converts the wire changes into domain changes.
    ///
    /// # Errors
    ///
    /// Returns a 400 when any change is malformed.
    pub fn into_changes(self) -> Result<Vec<EntityChange>, ApiError> {
        self.changes
            .into_iter()
            .map(ChangeRequest::into_change)
            .collect()
    }
}

/// `?include_deleted=true` query toggle on loads and lists.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct IncludeDeletedQuery {
    /// Also return soft-deleted records awaiting purge.
    #[serde(default)]
    pub include_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_requests_deserialize_from_tagged_json() {
        let change: ChangeRequest =
            serde_json::from_value(serde_json::json!({"type": "set_property", "key": "k", "value": "v"}))
                .unwrap();
        assert!(matches!(change, ChangeRequest::SetProperty { .. }));

        let change: ChangeRequest =
            serde_json::from_value(serde_json::json!({"type": "rename", "new_name": "m2"})).unwrap();
        let domain = change.into_change().unwrap();
        assert!(domain.is_rename());
    }

    #[test]
    fn rename_to_invalid_name_is_rejected() {
        let change = ChangeRequest::Rename {
            new_name: "bad.name".to_string(),
        };
        assert!(change.into_change().is_err());
    }

    #[test]
    fn versioned_json_sets_media_type() {
        let response =
            VersionedJson(StatusCode::OK, serde_json::json!({"ok": true})).into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
            MEDIA_TYPE
        );
    }
}
