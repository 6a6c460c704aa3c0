//! Request extractors

use axum::extract::FromRequestParts;
use http::request::Parts;
use shared::{Actor, AppError};

use crate::collaborators::IdentityProvider;
use crate::core::ServerState;

/// Authenticated caller, resolved from the `Authorization: Bearer`
/// credential through the identity provider.
pub struct Caller(pub Actor);

impl FromRequestParts<ServerState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(AppError::not_authenticated)?;

        let actor = state.identity.resolve_actor(token).await?;
        Ok(Caller(actor))
    }
}
