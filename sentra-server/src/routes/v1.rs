use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    auth::auth_middleware,
    handlers::auth::{logout, refresh},
    handlers::device::{
        add_device, list_devices, remove_device, update_device_battery, update_device_location,
    },
    handlers::emergency::{
        cancel_emergency, emergency_history, emergency_status, resolve_emergency,
        trigger_emergency,
    },
    infra::app_state::AppState,
    realtime::websocket_handler,
};

/// Create all v1 API routes.
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // The WebSocket handshake authenticates via query token inside
        // the handler; bearer middleware cannot see upgrade requests
        // from browsers.
        .route("/ws", get(websocket_handler))
        // Public: authenticates via the refresh token it carries.
        .route("/auth/refresh", post(refresh))
        .merge(create_protected_routes(state))
}

fn create_protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/emergencies/trigger", post(trigger_emergency))
        .route("/emergencies/{id}/resolve", post(resolve_emergency))
        .route("/emergencies/{id}/cancel", post(cancel_emergency))
        .route("/emergencies/{id}", get(emergency_status))
        .route("/emergencies", get(emergency_history))
        .route("/devices", get(list_devices).post(add_device))
        .route("/devices/{id}", delete(remove_device))
        .route("/devices/{id}/battery", put(update_device_battery))
        .route("/devices/{id}/location", put(update_device_location))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
