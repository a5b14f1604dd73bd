//! Request context extraction and authentication middleware.
//!
//! Every authenticated request resolves to a [`RequestContext`] carrying the
//! acting principal and a correlation request ID. In debug mode the principal
//! comes from the `X-Principal` header; in production it comes from a
//! verified JWT bearer token.

use std::sync::Arc;

use axum::async_trait;
use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use ulid::Ulid;

use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::server::AppState;

/// Header carrying the request ID, echoed back on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the principal in debug mode.
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// Header carrying an optional idempotency key, accepted and logged.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Identity and correlation data resolved for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The acting principal; becomes the audit creator/modifier.
    pub principal: String,
    /// Correlation ID, taken from `X-Request-Id` or freshly minted.
    pub request_id: String,
    /// Client-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<Self>() {
            return Ok(ctx.clone());
        }

        let request_id = header_string(parts, REQUEST_ID_HEADER)
            .unwrap_or_else(|| Ulid::new().to_string());
        let idempotency_key = header_string(parts, IDEMPOTENCY_KEY_HEADER);

        let principal = if state.config.debug {
            header_string(parts, PRINCIPAL_HEADER).ok_or_else(|| {
                ApiError::missing_auth().with_request_id(request_id.clone())
            })?
        } else {
            extract_principal_from_jwt(parts, &state.config.jwt)
                .map_err(|err| err.with_request_id(request_id.clone()))?
        };

        if let Some(key) = idempotency_key.as_deref() {
            tracing::debug!(request_id = %request_id, idempotency_key = %key, "Idempotency key received");
        }

        let ctx = Self {
            principal,
            request_id,
            idempotency_key,
        };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

fn header_string(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn bearer_token(parts: &Parts) -> Result<String, ApiError> {
    let header = header_string(parts, "authorization").ok_or_else(ApiError::missing_auth)?;
    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(ApiError::invalid_token)
}

fn jwt_decoding_key(jwt: &JwtConfig) -> Result<(DecodingKey, Algorithm), ApiError> {
    match (&jwt.hs256_secret, &jwt.rs256_public_key_pem) {
        (Some(secret), None) => Ok((
            DecodingKey::from_secret(secret.as_bytes()),
            Algorithm::HS256,
        )),
        (None, Some(pem)) => DecodingKey::from_rsa_pem(pem.as_bytes())
            .map(|key| (key, Algorithm::RS256))
            .map_err(|_| ApiError::internal("invalid RS256 public key configured")),
        _ => Err(ApiError::internal(
            "exactly one of the JWT secret or public key must be configured",
        )),
    }
}

fn extract_principal_from_jwt(parts: &Parts, jwt: &JwtConfig) -> Result<String, ApiError> {
    let token = bearer_token(parts)?;
    let (key, algorithm) = jwt_decoding_key(jwt)?;

    let mut validation = Validation::new(algorithm);
    validation.validate_nbf = true;
    if let Some(issuer) = &jwt.issuer {
        validation.set_issuer(&[issuer]);
    }
    if let Some(audience) = &jwt.audience {
        validation.set_audience(&[audience]);
    }

    let claims = decode::<serde_json::Value>(&token, &key, &validation)
        .map_err(|_| ApiError::invalid_token())?
        .claims;

    claims
        .get(&jwt.principal_claim)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::unauthorized(format!(
                "token is missing the '{}' claim",
                jwt.principal_claim
            ))
        })
}

/// Authenticates the request and injects the [`RequestContext`].
///
/// The context's request ID is echoed back in the `X-Request-Id` response
/// header for correlation.
pub async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let ctx = match RequestContext::from_request_parts(&mut parts, &state).await {
        Ok(ctx) => ctx,
        Err(err) => return err.into_response(),
    };

    let request_id = ctx.request_id.clone();
    parts.extensions.insert(ctx);

    let mut response = next.run(Request::from_parts(parts, body)).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(axum::http::header::HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = HttpRequest::builder().uri("/api/v1/metalakes");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    fn hs256_config(secret: &str) -> JwtConfig {
        JwtConfig {
            hs256_secret: Some(secret.to_string()),
            principal_claim: "sub".to_string(),
            ..JwtConfig::default()
        }
    }

    fn mint_token(secret: &str, claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_token_requires_prefix() {
        let parts = parts_with(&[("authorization", "Token abc")]);
        assert!(bearer_token(&parts).is_err());

        let parts = parts_with(&[("authorization", "Bearer abc")]);
        assert_eq!(bearer_token(&parts).unwrap(), "abc");
    }

    #[test]
    fn missing_authorization_is_rejected() {
        let parts = parts_with(&[]);
        let err = bearer_token(&parts).unwrap_err();
        assert_eq!(err.code(), "MISSING_AUTH");
    }

    #[test]
    fn valid_hs256_token_yields_principal() {
        let secret = "test-secret";
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = mint_token(secret, &serde_json::json!({ "sub": "alice", "exp": exp }));
        let parts = parts_with(&[("authorization", &format!("Bearer {token}"))]);

        let principal = extract_principal_from_jwt(&parts, &hs256_config(secret)).unwrap();
        assert_eq!(principal, "alice");
    }

    #[test]
    fn token_missing_principal_claim_is_rejected() {
        let secret = "test-secret";
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = mint_token(secret, &serde_json::json!({ "exp": exp }));
        let parts = parts_with(&[("authorization", &format!("Bearer {token}"))]);

        let err = extract_principal_from_jwt(&parts, &hs256_config(secret)).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = mint_token("other-secret", &serde_json::json!({ "sub": "alice", "exp": exp }));
        let parts = parts_with(&[("authorization", &format!("Bearer {token}"))]);

        let err = extract_principal_from_jwt(&parts, &hs256_config("test-secret")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }
}
