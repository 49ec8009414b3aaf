pub mod v1;

use axum::{Router, routing::get};

use crate::handlers::health::health_check;
use crate::infra::app_state::AppState;

/// Create the main API router with all versions.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1::create_v1_router(state))
}
