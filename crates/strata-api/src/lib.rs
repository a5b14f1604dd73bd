//! # strata-api
//!
//! HTTP composition layer for the Strata federated metadata catalog.
//!
//! This crate provides the REST surface for Strata, handling:
//!
//! - **Authentication**: Bearer-token (JWT) principal extraction
//! - **Routing**: the `/api/v1` metalake/catalog/schema/object hierarchy
//! - **Service Wiring**: composition of the federation engine and providers
//! - **Observability**: structured request traces and health checks
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer** with no domain policy.
//! All federation logic lives in `strata-federation`.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /health                 - Health check
//! GET  /ready                  - Readiness check
//! /api/v1/metalakes            - Metalake CRUD
//! /api/v1/metalakes/{m}/catalogs            - Catalog CRUD + connection probe
//! /api/v1/metalakes/{m}/catalogs/{c}/schemas            - Schema CRUD
//! /api/v1/metalakes/{m}/catalogs/{c}/schemas/{s}/objects - Object CRUD
//! /api/v1/openapi.json         - OpenAPI document
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_api::config::Config;
//! use strata_api::server::Server;
//!
//! let server = Server::new(Config::default());
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod server;
