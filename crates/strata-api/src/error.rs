//! API error types and HTTP response mapping.

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::HeaderName;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use strata_core::Error as CoreError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
    /// Structured detail, e.g. which side of a partial failure committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub detail: Option<serde_json::Value>,
    /// Optional request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: Option<serde_json::Value>,
    request_id: Option<String>,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// Returns an error response for authentication failures.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Returns an error response when the Authorization header is missing.
    #[must_use]
    pub fn missing_auth() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "MISSING_AUTH",
            "Authorization header required",
        )
    }

    /// Returns an error response when the bearer token is invalid.
    #[must_use]
    pub fn invalid_token() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Invalid bearer token",
        )
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response for identifier conflicts.
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Attaches a request ID for correlation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches a Retry-After header value in seconds.
    #[must_use]
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    /// Attaches structured detail serialized into the response body.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the request ID, if one was attached.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: None,
            request_id: None,
            retry_after_secs: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id;
        let retry_after_secs = self.retry_after_secs;
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
                detail: self.detail,
                request_id: request_id.clone(),
            }),
        )
            .into_response();

        if let Some(request_id) = request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), value);
            }
        }

        if let Some(secs) = retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("retry-after"), value);
            }
        }

        response
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        let code = value.kind();
        match &value {
            CoreError::Validation { .. } | CoreError::NotSupported { .. } => {
                Self::new(StatusCode::BAD_REQUEST, code, value.to_string())
            }
            CoreError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, code, value.to_string())
            }
            CoreError::AlreadyExists { .. } | CoreError::VersionConflict { .. } => {
                Self::new(StatusCode::CONFLICT, code, value.to_string())
            }
            CoreError::LockTimeout { .. } | CoreError::Timeout { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, code, value.to_string())
                    .with_retry_after(1)
            }
            CoreError::RemoteUnavailable { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, code, value.to_string()).with_retry_after(1)
            }
            CoreError::RemoteRejected { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, value.to_string())
            }
            CoreError::PartialFailure { detail } => {
                let serialized = serde_json::to_value(detail).unwrap_or_default();
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, value.to_string())
                    .with_detail(serialized)
            }
            CoreError::Storage { .. }
            | CoreError::Serialization { .. }
            | CoreError::Internal { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::error::PartialFailureDetail;

    #[test]
    fn conflict_kinds_map_to_409() {
        for err in [
            CoreError::already_exists("m1 already exists"),
            CoreError::VersionConflict {
                ident: "m1".to_string(),
                expected: 1,
                actual: 2,
            },
        ] {
            let api: ApiError = err.into();
            assert_eq!(api.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn retryable_kinds_carry_retry_after() {
        let err = CoreError::LockTimeout {
            path: "m1.c1".to_string(),
            waited_ms: 5000,
        };
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.code(), "LOCK_TIMEOUT");

        let response = api.into_response();
        let retry_after = response
            .headers()
            .get("retry-after")
            .expect("Retry-After header should be present");
        assert_eq!(retry_after.to_str().unwrap(), "1");
    }

    #[test]
    fn partial_failure_serializes_detail() {
        let err = CoreError::PartialFailure {
            detail: PartialFailureDetail {
                ident: "m1.c1.s1".to_string(),
                operation: "create_schema".to_string(),
                remote_committed: true,
                local_committed: false,
                failed_step: "local write and compensating drop both failed".to_string(),
            },
        };
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code(), "PARTIAL_FAILURE");

        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn request_id_round_trips_into_header() {
        let api = ApiError::not_found("missing").with_request_id("req-42");
        let response = api.into_response();
        assert_eq!(
            response.headers().get("x-request-id").unwrap().to_str().unwrap(),
            "req-42"
        );
    }
}
