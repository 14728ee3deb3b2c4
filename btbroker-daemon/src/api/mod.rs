/*!
 * HTTP API for the broker
 * JSON over axum, Basic-auth gated under /api/v1
 */

pub mod auth;
pub mod bluetooth;
pub mod error;
pub mod health;
pub mod tokens;

use axum::{
    extract::Request,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};
use uuid::Uuid;

use crate::bluetooth::BluetoothService;
use crate::config::HttpConfig;
use crate::tokens::TokenStore;

#[derive(Clone)]
pub struct AppState {
    pub bluetooth: Arc<dyn BluetoothService>,
    pub tokens: TokenStore,
}

impl AppState {
    pub fn new(bluetooth: Arc<dyn BluetoothService>, tokens: TokenStore) -> Self {
        Self { bluetooth, tokens }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

pub fn router(state: AppState, config: &HttpConfig) -> Router {
    let api = Router::new()
        .route(
            "/tokens",
            post(tokens::create_token).get(tokens::list_tokens),
        )
        .route(
            "/tokens/{username}",
            get(tokens::get_token).delete(tokens::delete_token),
        )
        .route("/bluetooth/adapters", get(bluetooth::get_adapters))
        .route(
            "/bluetooth/adapters/{adapter}/discoverable",
            patch(bluetooth::set_discoverable),
        )
        .route(
            "/bluetooth/adapters/{adapter}/discovering",
            patch(bluetooth::set_discovering),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices",
            get(bluetooth::get_devices),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/trusted",
            get(bluetooth::get_trusted_devices),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/connected",
            get(bluetooth::get_connected_devices),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/{mac}",
            delete(bluetooth::remove_device),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/{mac}/pair",
            post(bluetooth::pair_device),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/{mac}/connect",
            post(bluetooth::connect_device),
        )
        .route(
            "/bluetooth/adapters/{adapter}/devices/{mac}/trust",
            post(bluetooth::trust_device),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    let mut router = Router::new()
        .route("/livez", get(health::liveness))
        .route("/readyz", get(health::readiness))
        .nest("/api/v1", api);

    if let Some(index) = &config.static_index {
        router = router.route_service("/", ServeFile::new(index));
    }

    let router = router.layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }));

    let router = if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}
