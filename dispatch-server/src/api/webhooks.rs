//! Payment provider webhooks
//!
//! Signature verification happens at the ingress proxy; by the time a
//! request reaches this route its payload is trusted. The handler
//! always acknowledges so the provider stops redelivering.

use axum::{extract::State, routing::post, Json, Router};
use shared::ApiResponse;

use crate::core::ServerState;
use crate::lifecycle::WebhookEvent;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/webhooks/payments", post(payment_event))
}

async fn payment_event(
    State(state): State<ServerState>,
    Json(event): Json<WebhookEvent>,
) -> ApiResponse<()> {
    if let Err(e) = state.authority.reconcile(&event).await {
        // Storage-level failure: let the provider redeliver
        tracing::error!(raw_event_id = %event.raw_event_id, error = %e, "Webhook reconcile failed");
        return ApiResponse::error(&e);
    }
    ApiResponse::ok()
}
