use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sentra_core::database::EmergencyStore;
use sentra_core::dispatch::{self, EmergencyHistoryPage, EmergencyStatusView};
use sentra_core::model::{Emergency, EmergencyInput, EmergencyStatus, EmergencyType, Severity};

use super::require_customer;
use crate::auth::AuthSession;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct TriggerEmergencyRequest {
    pub device_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub description: Option<String>,
    pub location_data: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct TriggerEmergencyResponse {
    pub id: Uuid,
    pub status: EmergencyStatus,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Operators may scope history to a customer; customers may not.
    pub customer_id: Option<Uuid>,
}

/// POST /api/v1/emergencies/trigger
///
/// Enum fields arrive as strings and are validated here, upstream of
/// the dispatch core.
pub async fn trigger_emergency(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<TriggerEmergencyRequest>,
) -> AppResult<(StatusCode, Json<TriggerEmergencyResponse>)> {
    let customer_id = require_customer(&session)?;

    let severity: Severity = req
        .severity
        .parse()
        .map_err(|_| AppError::bad_request(format!("unknown severity: {}", req.severity)))?;
    let kind: EmergencyType = req
        .kind
        .parse()
        .map_err(|_| AppError::bad_request(format!("unknown emergency type: {}", req.kind)))?;

    if let Some(device_id) = req.device_id
        && state
            .devices
            .get_owned(device_id, customer_id)
            .await?
            .is_none()
    {
        return Err(AppError::not_found("Device not found"));
    }

    let input = EmergencyInput {
        customer_id,
        device_id: req.device_id,
        severity,
        kind,
        description: req.description,
        location_data: req.location_data,
    };

    let emergency = dispatch::process_emergency(&state.dispatch_ctx(), input).await?;

    Ok((
        StatusCode::CREATED,
        Json(TriggerEmergencyResponse {
            id: emergency.id,
            status: emergency.status,
            severity: emergency.severity,
            created_at: emergency.created_at,
        }),
    ))
}

/// POST /api/v1/emergencies/{id}/resolve
pub async fn resolve_emergency(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<LifecycleRequest>,
) -> AppResult<Json<Emergency>> {
    load_scoped(&state, &session, id).await?;

    let operator_id = session.is_operator().then_some(session.claims.sub);
    let emergency =
        dispatch::resolve_emergency(&state.dispatch_ctx(), id, operator_id, req.notes.as_deref())
            .await?;

    Ok(Json(emergency))
}

/// POST /api/v1/emergencies/{id}/cancel
///
/// Cancellation is a customer action; operators resolve instead.
pub async fn cancel_emergency(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Emergency>> {
    require_customer(&session)?;
    load_scoped(&state, &session, id).await?;

    let emergency = dispatch::cancel_emergency(&state.dispatch_ctx(), id).await?;
    Ok(Json(emergency))
}

/// GET /api/v1/emergencies/{id}
pub async fn emergency_status(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EmergencyStatusView>> {
    load_scoped(&state, &session, id).await?;

    let view = dispatch::get_emergency_status(&state.dispatch_ctx(), id).await?;
    Ok(Json(view))
}

/// GET /api/v1/emergencies
pub async fn emergency_history(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<EmergencyHistoryPage>> {
    let customer_id = match session.customer_id() {
        Some(id) => {
            if query.customer_id.is_some_and(|requested| requested != id) {
                return Err(AppError::forbidden("Cannot view another customer's history"));
            }
            id
        }
        None => query
            .customer_id
            .ok_or_else(|| AppError::bad_request("customer_id is required"))?,
    };

    let page = dispatch::get_emergency_history(
        &state.dispatch_ctx(),
        customer_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
    )
    .await?;

    Ok(Json(page))
}

/// Fetch the emergency and enforce visibility: customers see only
/// their own, operators see all. A foreign emergency reads as absent
/// rather than forbidden.
async fn load_scoped(state: &AppState, session: &AuthSession, id: Uuid) -> AppResult<Emergency> {
    let emergency = state
        .emergencies
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Emergency not found"))?;

    if let Some(customer_id) = session.customer_id()
        && emergency.customer_id != customer_id
    {
        return Err(AppError::not_found("Emergency not found"));
    }

    Ok(emergency)
}
