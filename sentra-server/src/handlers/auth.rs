use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use sentra_core::database::CustomerStore;

use crate::auth::{AuthSession, TokenType, jwt};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// POST /api/v1/auth/refresh (public)
///
/// Exchanges a valid refresh token for a fresh pair. The presented
/// refresh token is revoked, so each one is single-use.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<TokenPairResponse>> {
    let claims = state
        .auth
        .decode(&req.refresh_token, TokenType::Refresh)
        .map_err(|_| AppError::unauthorized("Invalid refresh token"))?;

    if jwt::is_revoked(&state.cache, &claims).await? {
        return Err(AppError::unauthorized("Token has been revoked"));
    }

    if let Some(customer) = state.customers.get(claims.sub).await?
        && !customer.is_active()
    {
        return Err(AppError::forbidden("Account is not active"));
    }

    jwt::revoke(&state.cache, &claims).await?;

    let access_token = state
        .auth
        .issue(claims.sub, claims.role, TokenType::Access)
        .map_err(|e| AppError::internal(e.to_string()))?;
    let refresh_token = state
        .auth
        .issue(claims.sub, claims.role, TokenType::Refresh)
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        expires_in: state.config.auth.access_ttl_secs,
    }))
}

/// POST /api/v1/auth/logout
///
/// Revokes the presented access token for its remaining lifetime.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Json<serde_json::Value>> {
    jwt::revoke(&state.cache, &session.claims).await?;

    info!(sub = %session.claims.sub, "session logged out");
    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}
