// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP admin transport for the orchestration daemon.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all admin routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Provisioning
        .route("/api/v1/devices", post(http::provision_device))
        .route("/api/v1/devices/{sensor_id}", delete(http::deprovision_device))
        // Sensors
        .route("/api/v1/sensors", get(http::list_sensors))
        .route("/api/v1/sensors/{sensor_id}", get(http::get_sensor))
        .route("/api/v1/sensors/{sensor_id}/config", patch(http::patch_sensor_config))
        .route("/api/v1/sensors/{sensor_id}/commands", post(http::send_command))
        .route("/api/v1/sensors/{sensor_id}/events", get(http::sensor_events))
        // Users
        .route("/api/v1/users/{user_id}", get(http::get_user))
        .route(
            "/api/v1/users/{user_id}/music",
            post(http::connect_music).delete(http::disconnect_music),
        )
        // Sessions
        .route("/api/v1/sessions", get(http::list_sessions))
        .route("/api/v1/sessions/{session_id}", get(http::get_session))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
