//! Route configuration and setup

pub mod health;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use imgflow_core::Config;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, webhook_token_middleware, AuthState, WebhookAuthState};
use crate::constants::{API_PREFIX, MAX_REQUEST_BODY_BYTES};
use crate::handlers;
use crate::state::AppState;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
    });
    let webhook_state = Arc::new(WebhookAuthState {
        token: config.event_webhook_token().to_string(),
    });

    // Bearer-authenticated client routes
    let upload_routes = Router::new()
        .route(
            &format!("{}/uploads", API_PREFIX),
            post(handlers::uploads::request_upload),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    // Notification delivery, guarded by the shared webhook token
    let event_routes = Router::new()
        .route(
            &format!("{}/events/object-created", API_PREFIX),
            post(handlers::events::object_created),
        )
        .layer(axum::middleware::from_fn_with_state(
            webhook_state,
            webhook_token_middleware,
        ));

    let public_routes = Router::new().route("/health", get(health::health_check));

    let app = public_routes
        .merge(upload_routes)
        .merge(event_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        );

    Ok(app)
}

/// Setup CORS layer
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("CORS_ORIGINS contains an invalid origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
