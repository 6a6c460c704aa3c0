//! Rental API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use shared::{Actor, ActorRole, ApiResponse, AppError, LifecycleEvent, RentalSnapshot};

use crate::api::extract::Caller;
use crate::core::ServerState;
use crate::lifecycle::authority::ReviewDecision;
use crate::lifecycle::gate::DepositDecision;

type AppResult<T> = Result<T, AppError>;

fn ensure_can_view(actor: &Actor, snapshot: &RentalSnapshot) -> AppResult<()> {
    let allowed = match actor.role {
        ActorRole::Admin | ActorRole::System => true,
        ActorRole::Customer => actor.is(&snapshot.owner_id),
        ActorRole::Driver => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("Not a participant of this rental"))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub rent_cents: i64,
    #[serde(default)]
    pub deposit_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub docs_complete: bool,
}

fn default_currency() -> String {
    "EUR".into()
}

pub async fn create(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Json(payload): Json<CreateRequest>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state
        .authority
        .create_rental(
            &actor,
            payload.rent_cents,
            payload.deposit_cents,
            &payload.currency,
            payload.docs_complete,
        )
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state.authority.get_rental(&id)?;
    ensure_can_view(&actor, &snapshot)?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn events(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<LifecycleEvent>>> {
    match state.authority.get_rental(&id) {
        Ok(snapshot) => ensure_can_view(&actor, &snapshot)?,
        Err(_) if actor.role == ActorRole::Admin => {}
        Err(e) => return Err(e),
    }
    Ok(ApiResponse::success(state.audit.events_for(&id)?))
}

pub async fn submit(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state.authority.submit_rental(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub reason: Option<String>,
}

pub async fn review(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state
        .authority
        .review_rental(&actor, &id, payload.decision, payload.reason.as_deref())
        .await?;
    Ok(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub purpose: String,
}

pub async fn sign(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(payload): Json<SignRequest>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state
        .authority
        .sign_agreement(&actor, &id, &payload.purpose)
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn release_lockbox(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state.authority.release_lockbox(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn confirm_pickup(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state.authority.confirm_pickup(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn confirm_return(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state.authority.confirm_return(&actor, &id).await?;
    Ok(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct ResolveDepositRequest {
    pub decision: DepositDecision,
    pub reason: Option<String>,
    pub amount_cents: Option<i64>,
}

pub async fn resolve_deposit(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(payload): Json<ResolveDepositRequest>,
) -> AppResult<ApiResponse<RentalSnapshot>> {
    let snapshot = state
        .authority
        .resolve_deposit(
            &actor,
            &id,
            payload.decision,
            payload.reason.as_deref(),
            payload.amount_cents,
        )
        .await?;
    Ok(ApiResponse::success(snapshot))
}

pub async fn delete_draft(
    State(state): State<ServerState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.authority.delete_draft_rental(&actor, &id).await?;
    Ok(ApiResponse::ok())
}
