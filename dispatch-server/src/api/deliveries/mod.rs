//! Delivery API module
//!
//! All mutations go through the lifecycle authority; these routes only
//! authenticate the caller and shape requests and responses.

mod handler;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/deliveries", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}", delete(handler::delete_draft))
        .route("/{id}/events", get(handler::events))
        .route("/{id}/checkout", post(handler::checkout))
        .route("/{id}/assign", post(handler::assign))
        .route("/{id}/start", post(handler::start))
        .route("/{id}/complete", post(handler::complete))
        .route("/{id}/cancel", post(handler::cancel))
        // Photo-service callbacks (upstream-verified, no bearer token)
        .route("/{id}/photos/pickup", post(handler::pickup_photo))
        .route("/{id}/photos/dropoff", post(handler::dropoff_photo))
}
