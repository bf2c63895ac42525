// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API server for the courier integration console.
//!
//! Routes:
//! - `POST /courier-proxy` — execute a declarative courier API call and
//!   return the classified result in-band.
//! - `POST /mapping-module` — compile a courier's field mappings into a
//!   downloadable JavaScript adapter module.
//! - `GET /health` — liveness probe.

pub mod config;
pub mod handlers;
pub mod state;

pub use config::{Config, ConfigError};
pub use state::{AppState, default_overrides};

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/courier-proxy", post(handlers::courier_proxy))
        .route("/mapping-module", post(handlers::mapping_module))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
