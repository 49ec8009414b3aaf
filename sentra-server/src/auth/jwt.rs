use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentra_core::cache::{CacheKeys, RedisCache};

use crate::infra::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Operator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Signing and verification keys for the dual access/refresh token
/// scheme. Built from config once at startup; tests construct their
/// own with literal secrets.
#[derive(Clone)]
pub struct AuthKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeys")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthKeys {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(
            &auth.jwt_secret,
            &auth.jwt_refresh_secret,
            auth.access_ttl_secs,
            auth.refresh_ttl_secs,
        )
    }

    pub fn issue(
        &self,
        sub: Uuid,
        role: Role,
        token_type: TokenType,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub,
            role,
            token_type,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let key = match token_type {
            TokenType::Access => &self.access_encoding,
            TokenType::Refresh => &self.refresh_encoding,
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
    }

    /// Decode a token, enforcing both the signature of the expected
    /// family and the embedded token type.
    pub fn decode(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        let key = match expected {
            TokenType::Access => &self.access_decoding,
            TokenType::Refresh => &self.refresh_decoding,
        };

        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, key, &validation)?;

        if data.claims.token_type != expected {
            return Err(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidToken,
            ));
        }

        Ok(data.claims)
    }
}

/// Check the cache-backed revocation list.
pub async fn is_revoked(cache: &RedisCache, claims: &Claims) -> sentra_core::Result<bool> {
    cache.exists(&CacheKeys::token_blacklist(&claims.jti)).await
}

/// Revoke a token for its remaining lifetime. Already-expired tokens
/// need no list entry.
pub async fn revoke(cache: &RedisCache, claims: &Claims) -> sentra_core::Result<()> {
    let remaining = claims.exp - Utc::now().timestamp();
    if remaining <= 0 {
        return Ok(());
    }

    cache
        .set(
            &CacheKeys::token_blacklist(&claims.jti),
            &true,
            Some(std::time::Duration::from_secs(remaining as u64)),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AuthKeys {
        AuthKeys::new("access-secret", "refresh-secret", 900, 604_800)
    }

    #[test]
    fn issue_and_decode_access_token() {
        let keys = keys();
        let customer_id = Uuid::new_v4();

        let token = keys
            .issue(customer_id, Role::Customer, TokenType::Access)
            .expect("failed to issue token");
        let claims = keys
            .decode(&token, TokenType::Access)
            .expect("failed to decode token");

        assert_eq!(claims.sub, customer_id);
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_token_is_rejected_as_access() {
        let keys = keys();
        let token = keys
            .issue(Uuid::new_v4(), Role::Customer, TokenType::Refresh)
            .unwrap();

        // Different signing secret, so the access decode fails outright.
        assert!(keys.decode(&token, TokenType::Access).is_err());
    }

    #[test]
    fn type_claim_is_enforced_even_with_shared_secret() {
        let keys = AuthKeys::new("same", "same", 900, 900);
        let token = keys
            .issue(Uuid::new_v4(), Role::Customer, TokenType::Refresh)
            .unwrap();

        assert!(keys.decode(&token, TokenType::Access).is_err());
        assert!(keys.decode(&token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = AuthKeys::new("access-secret", "refresh-secret", -100, 900);
        let token = keys
            .issue(Uuid::new_v4(), Role::Customer, TokenType::Access)
            .unwrap();

        assert!(keys.decode(&token, TokenType::Access).is_err());
    }

    #[test]
    fn operator_role_round_trips() {
        let keys = keys();
        let operator_id = Uuid::new_v4();
        let token = keys
            .issue(operator_id, Role::Operator, TokenType::Access)
            .unwrap();
        let claims = keys.decode(&token, TokenType::Access).unwrap();

        assert_eq!(claims.role, Role::Operator);
        assert_eq!(claims.sub, operator_id);
    }
}
