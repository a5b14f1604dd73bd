//! Observability infrastructure for Strata.
//!
//! Structured logging with consistent spans across all components. This
//! module provides initialization helpers and span constructors.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Directives applied when `RUST_LOG` is unset: the catalog's own crates at
/// `info`, the HTTP stack quieted down to warnings.
const DEFAULT_LOG_DIRECTIVES: &str = "info,hyper=warn,h2=warn,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Overrides the default filter (e.g., `strata_federation=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));
        let registry = tracing_subscriber::registry().with(env_filter);

        match format {
            // Events flattened for log pipelines that index top-level fields.
            LogFormat::Json => registry
                .with(fmt::layer().json().flatten_event(true))
                .init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_target(false))
                .init(),
        }
    });
}

/// Creates a span for a federation operation with standard fields.
///
/// # Example
///
/// ```rust
/// use strata_core::observability::operation_span;
///
/// let span = operation_span("create_schema", "t1.c1.s1");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn operation_span(operation: &str, ident: &str) -> Span {
    tracing::info_span!("federation", op = operation, ident = ident)
}

/// Creates a span for a provider call.
#[must_use]
pub fn provider_span(operation: &str, provider_type: &str, catalog: &str) -> Span {
    tracing::info_span!(
        "provider",
        op = operation,
        provider = provider_type,
        catalog = catalog,
    )
}
