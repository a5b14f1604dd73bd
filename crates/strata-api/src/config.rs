//! Server configuration.
//!
//! All settings load from `STRATA_*` environment variables with sensible
//! defaults for local development.

use std::time::Duration;

use strata_core::Result;
use strata_federation::EngineConfig;

/// JWT verification configuration.
///
/// Exactly one of `hs256_secret` or `rs256_public_key_pem` must be set when
/// the server runs with `debug = false`.
#[derive(Clone, Default)]
pub struct JwtConfig {
    /// Shared secret for HS256 token verification.
    pub hs256_secret: Option<String>,
    /// PEM-encoded RSA public key for RS256 token verification.
    pub rs256_public_key_pem: Option<String>,
    /// Expected `iss` claim; unchecked when unset.
    pub issuer: Option<String>,
    /// Expected `aud` claim; unchecked when unset.
    pub audience: Option<String>,
    /// Claim carrying the principal string.
    pub principal_claim: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("hs256_secret", &self.hs256_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "rs256_public_key_pem",
                &self.rs256_public_key_pem.as_ref().map(|_| "[REDACTED]"),
            )
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("principal_claim", &self.principal_claim)
            .finish()
    }
}

fn default_principal_claim() -> String {
    "sub".to_string()
}

/// CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any origin (debug only).
    pub allowed_origins: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub http_port: u16,
    /// Debug mode: pretty logs, header-based auth, relaxed validation.
    pub debug: bool,
    /// JWT verification settings.
    pub jwt: JwtConfig,
    /// CORS settings.
    pub cors: CorsConfig,
    /// Soft-delete retention window in hours.
    pub retention_hours: i64,
    /// Bounded wait for hierarchy path locks, in milliseconds.
    pub lock_wait_ms: u64,
    /// Deadline for each remote provider call, in milliseconds.
    pub provider_deadline_ms: u64,
    /// Interval between purge sweeps, in seconds.
    pub purge_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: true,
            jwt: JwtConfig {
                principal_claim: default_principal_claim(),
                ..JwtConfig::default()
            },
            cors: CorsConfig::default(),
            retention_hours: strata_store::DEFAULT_RETENTION_HOURS,
            lock_wait_ms: 5_000,
            provider_deadline_ms: 10_000,
            purge_interval_secs: 300,
        }
    }
}

impl Config {
    /// Loads configuration from `STRATA_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`strata_core::Error::Validation`] when a variable is set
    /// but unparseable.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            http_port: env_u16("STRATA_HTTP_PORT")?.unwrap_or(defaults.http_port),
            debug: env_bool("STRATA_DEBUG")?.unwrap_or(defaults.debug),
            jwt: JwtConfig {
                hs256_secret: env_string("STRATA_JWT_SECRET"),
                rs256_public_key_pem: env_string("STRATA_JWT_PUBLIC_KEY_PEM")
                    .map(|pem| normalize_pem(&pem)),
                issuer: env_string("STRATA_JWT_ISSUER"),
                audience: env_string("STRATA_JWT_AUDIENCE"),
                principal_claim: env_string("STRATA_JWT_PRINCIPAL_CLAIM")
                    .unwrap_or_else(default_principal_claim),
            },
            cors: CorsConfig {
                allowed_origins: env_string("STRATA_CORS_ALLOWED_ORIGINS")
                    .map(|raw| parse_cors_allowed_origins(&raw))
                    .unwrap_or_default(),
                max_age_seconds: env_u64("STRATA_CORS_MAX_AGE_SECONDS")?
                    .unwrap_or(defaults.cors.max_age_seconds),
            },
            retention_hours: env_i64("STRATA_RETENTION_HOURS")?
                .unwrap_or(defaults.retention_hours),
            lock_wait_ms: env_u64("STRATA_LOCK_WAIT_MS")?.unwrap_or(defaults.lock_wait_ms),
            provider_deadline_ms: env_u64("STRATA_PROVIDER_DEADLINE_MS")?
                .unwrap_or(defaults.provider_deadline_ms),
            purge_interval_secs: env_u64("STRATA_PURGE_INTERVAL_SECS")?
                .unwrap_or(defaults.purge_interval_secs),
        })
    }

    /// Returns the federation engine configuration derived from this config.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            lock_wait: Duration::from_millis(self.lock_wait_ms),
            provider_deadline: Duration::from_millis(self.provider_deadline_ms),
            purge_interval: Duration::from_secs(self.purge_interval_secs),
        }
    }

    /// Returns the soft-delete retention window.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }
}

fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn env_u16(key: &str) -> Result<Option<u16>> {
    env_string(key)
        .map(|raw| {
            raw.parse::<u16>().map_err(|_| {
                strata_core::Error::validation(format!("{key} must be a u16, got '{raw}'"))
            })
        })
        .transpose()
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_string(key)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                strata_core::Error::validation(format!("{key} must be a u64, got '{raw}'"))
            })
        })
        .transpose()
}

fn env_i64(key: &str) -> Result<Option<i64>> {
    env_string(key)
        .map(|raw| {
            raw.parse::<i64>().map_err(|_| {
                strata_core::Error::validation(format!("{key} must be an i64, got '{raw}'"))
            })
        })
        .transpose()
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    env_string(key).map(|raw| parse_bool(key, &raw)).transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(strata_core::Error::validation(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}

/// Restores real newlines in a PEM passed through a single-line env var.
fn normalize_pem(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_cors_allowed_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
