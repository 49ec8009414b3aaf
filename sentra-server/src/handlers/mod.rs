pub mod auth;
pub mod device;
pub mod emergency;
pub mod health;

use uuid::Uuid;

use crate::auth::AuthSession;
use crate::infra::errors::AppError;

/// Endpoints scoped to a customer account reject operator sessions.
pub(crate) fn require_customer(session: &AuthSession) -> Result<Uuid, AppError> {
    session
        .customer_id()
        .ok_or_else(|| AppError::forbidden("Customer session required"))
}
