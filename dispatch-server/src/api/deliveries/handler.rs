//! Delivery API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use shared::{Actor, ActorRole, ApiResponse, AppError, DeliverySnapshot, LifecycleEvent};

use crate::api::extract::Caller;
use crate::collaborators::PhotoPhase;
use crate::core::ServerState;

type AppResult<T> = Result<T, AppError>;

/// Snapshot reads are limited to the owner, the assigned driver and
/// admins.
fn ensure_can_view(actor: &Actor, snapshot: &DeliverySnapshot) -> AppResult<()> {
    let allowed = match actor.role {
        ActorRole::Admin | ActorRole::System => true,
        ActorRole::Customer => actor.is(&snapshot.owner_id),
        ActorRole::Driver => snapshot
            .assignee_id
            .as_deref()
            .is_some_and(|a| actor.is(a)),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("Not a participant of this delivery"))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".into()
}

pub async fn create(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Json(payload): Json<CreateRequest>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state
        .authority
        .create_delivery(&actor, payload.amount_cents, &payload.currency)
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state.authority.get_delivery(&id)?;
    ensure_can_view(&actor, &snapshot)?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn events(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<LifecycleEvent>>> {
    // The trail outlives the resource; a missing snapshot only limits
    // access to admins
    match state.authority.get_delivery(&id) {
        Ok(snapshot) => ensure_can_view(&actor, &snapshot)?,
        Err(_) if actor.role == ActorRole::Admin => {}
        Err(e) => return Err(e),
    }
    Ok(ApiResponse::success(state.audit.events_for(&id)?))
}

pub async fn checkout(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state.authority.checkout_delivery(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub driver_id: String,
}

pub async fn assign(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state
        .authority
        .assign_driver(&actor, &id, &payload.driver_id)
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn start(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state.authority.start_transit(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn complete(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state.authority.complete_delivery(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

pub async fn cancel(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    let snapshot = state
        .authority
        .cancel_delivery(&actor, &id, &payload.reason)
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn delete_draft(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.authority.delete_draft_delivery(&actor, &id).await?;
    Ok(ApiResponse::ok())
}

/// Pickup photo recorded by the photo service; advances the delivery
/// to `ready_for_dispatch`.
pub async fn pickup_photo(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeliverySnapshot>> {
    state.photo_index.put_photo(&id, PhotoPhase::Pickup);
    let snapshot = state.authority.record_pickup_photo(&id).await?;
    Ok(ApiResponse::success(snapshot))
}

/// Dropoff photo recorded; only indexed, completion checks it later.
pub async fn dropoff_photo(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.photo_index.put_photo(&id, PhotoPhase::Dropoff);
    Ok(ApiResponse::ok())
}
