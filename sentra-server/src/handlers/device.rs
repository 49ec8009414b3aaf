use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use sentra_core::events::{EventSink, ServerEvent};
use sentra_core::model::{Device, LOW_BATTERY_THRESHOLD};

use super::require_customer;
use crate::auth::AuthSession;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct AddDeviceRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Option<String>,
    pub battery_level: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBatteryRequest {
    pub battery_level: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub location: String,
}

/// GET /api/v1/devices
pub async fn list_devices(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> AppResult<Json<Vec<Device>>> {
    let customer_id = require_customer(&session)?;
    let devices = state.devices.list_for_customer(customer_id).await?;
    Ok(Json(devices))
}

/// POST /api/v1/devices
pub async fn add_device(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<AddDeviceRequest>,
) -> AppResult<(StatusCode, Json<Device>)> {
    let customer_id = require_customer(&session)?;

    if let Some(level) = req.battery_level
        && !(0..=100).contains(&level)
    {
        return Err(AppError::bad_request("Battery level must be between 0 and 100"));
    }

    let device = state
        .devices
        .insert(
            customer_id,
            &req.kind,
            req.location.as_deref(),
            req.battery_level,
        )
        .await?;

    state.registry.notify_customer(
        customer_id,
        ServerEvent::DeviceConnected {
            device_id: device.id,
            device_type: device.kind.clone(),
            location: device.location.clone(),
            status: device.status.clone(),
            battery_level: device.battery_level,
        },
    );

    Ok((StatusCode::CREATED, Json(device)))
}

/// DELETE /api/v1/devices/{id}
pub async fn remove_device(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(device_id): Path<Uuid>,
) -> AppResult<Json<Device>> {
    let customer_id = require_customer(&session)?;

    let device = state
        .devices
        .delete_owned(device_id, customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Device not found"))?;

    state.registry.notify_customer(
        customer_id,
        ServerEvent::DeviceDisconnected {
            device_id: device.id,
            device_type: device.kind.clone(),
            location: device.location.clone(),
        },
    );

    Ok(Json(device))
}

/// PUT /api/v1/devices/{id}/battery
pub async fn update_device_battery(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(device_id): Path<Uuid>,
    Json(req): Json<UpdateBatteryRequest>,
) -> AppResult<Json<Device>> {
    let customer_id = require_customer(&session)?;

    if !(0..=100).contains(&req.battery_level) {
        return Err(AppError::bad_request("Battery level must be between 0 and 100"));
    }

    let device = state
        .devices
        .update_battery(device_id, customer_id, req.battery_level)
        .await?
        .ok_or_else(|| AppError::not_found("Device not found"))?;

    state.registry.notify_customer(
        customer_id,
        ServerEvent::DeviceStatusChanged {
            device_id: device.id,
            device_type: device.kind.clone(),
            location: device.location.clone(),
            battery_level: device.battery_level,
        },
    );

    if req.battery_level <= LOW_BATTERY_THRESHOLD {
        state.registry.notify_customer(
            customer_id,
            ServerEvent::BatteryLow {
                device_id: device.id,
                battery_level: req.battery_level,
                device_type: Some(device.kind.clone()),
                location: device.location.clone(),
                timestamp: chrono::Utc::now(),
            },
        );
    }

    Ok(Json(device))
}

/// PUT /api/v1/devices/{id}/location
pub async fn update_device_location(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(device_id): Path<Uuid>,
    Json(req): Json<UpdateLocationRequest>,
) -> AppResult<Json<Device>> {
    let customer_id = require_customer(&session)?;

    let device = state
        .devices
        .update_location(device_id, customer_id, &req.location)
        .await?
        .ok_or_else(|| AppError::not_found("Device not found"))?;

    state.registry.notify_customer(
        customer_id,
        ServerEvent::DeviceStatusChanged {
            device_id: device.id,
            device_type: device.kind.clone(),
            location: device.location.clone(),
            battery_level: None,
        },
    );

    Ok(Json(device))
}
