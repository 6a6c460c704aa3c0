//! Rental API module

mod handler;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/rentals", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}", delete(handler::delete_draft))
        .route("/{id}/events", get(handler::events))
        .route("/{id}/submit", post(handler::submit))
        .route("/{id}/review", post(handler::review))
        .route("/{id}/sign", post(handler::sign))
        .route("/{id}/lockbox-release", post(handler::release_lockbox))
        .route("/{id}/confirm-pickup", post(handler::confirm_pickup))
        .route("/{id}/confirm-return", post(handler::confirm_return))
        .route("/{id}/resolve-deposit", post(handler::resolve_deposit))
}
