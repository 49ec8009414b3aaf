use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use sentra_core::database::CustomerStore;
use sentra_core::model::Customer;
use uuid::Uuid;

use super::jwt::{self, Claims, Role, TokenType};
use crate::infra::{app_state::AppState, errors::AppError};

/// What the rest of the request pipeline knows about the caller.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub claims: Claims,
    /// Present for customer sessions; operators carry no customer row.
    pub customer: Option<Customer>,
}

impl AuthSession {
    pub fn customer_id(&self) -> Option<Uuid> {
        matches!(self.claims.role, Role::Customer).then_some(self.claims.sub)
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.claims.role, Role::Operator)
    }
}

/// Authenticate a bearer credential exactly once: signature, expiry,
/// token type, revocation, and (for customers) account standing.
pub async fn authenticate_token(state: &AppState, token: &str) -> Result<AuthSession, AppError> {
    let claims = state
        .auth
        .decode(token, TokenType::Access)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    if jwt::is_revoked(&state.cache, &claims)
        .await
        .map_err(AppError::from)?
    {
        return Err(AppError::unauthorized("Token has been revoked"));
    }

    match claims.role {
        Role::Operator => Ok(AuthSession {
            claims,
            customer: None,
        }),
        Role::Customer => {
            let customer = state
                .customers
                .get(claims.sub)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::unauthorized("Customer not found"))?;

            if !customer.is_active() {
                return Err(AppError::forbidden("Account is not active"));
            }

            Ok(AuthSession {
                claims,
                customer: Some(customer),
            })
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;
    let session = authenticate_token(&state, &token).await?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Result<String, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Access token required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("Access token required"))?;

    Ok(token.to_string())
}
