//! API routing
//!
//! # Structure
//!
//! - [`health`] - health check
//! - [`deliveries`] - delivery lifecycle endpoints
//! - [`rentals`] - rental lifecycle endpoints
//! - [`webhooks`] - payment provider callbacks

pub mod extract;

pub mod deliveries;
pub mod health;
pub mod rentals;
pub mod webhooks;

use axum::{middleware, Router};
use tower_http::cors::CorsLayer;

use crate::core::ServerState;

/// HTTP request access log middleware
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());

    response
}

/// Build the Axum app (stateless router, then layers)
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(deliveries::router())
        .merge(rentals::router())
        .merge(webhooks::router())
}

/// Full application router with state and middleware applied
pub fn router(state: ServerState) -> Router {
    build_app()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
}
