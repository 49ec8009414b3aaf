use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SentraError};
use crate::model::{CustomerEmergencyInfo, ProcessingMarker};

/// TTL-bound key-value store for transient markers.
///
/// The connection manager multiplexes over one connection and is
/// cheap to clone, so every call clones it rather than holding a
/// mutable borrow across await points.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis cache at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| SentraError::Downstream(format!("failed to create Redis client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SentraError::Downstream(format!("failed to connect to Redis: {e}")))?;

        info!("Successfully connected to Redis cache");

        Ok(Self { conn })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        debug!("Cache GET: {}", key);

        let mut conn = self.conn.clone();
        let data: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| SentraError::Downstream(format!("Redis GET failed: {e}")))?;

        match data {
            Some(json) => {
                let value = serde_json::from_str(&json)?;
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        debug!("Cache SET: {} (TTL: {:?})", key, ttl);

        let json = serde_json::to_string(value)?;

        let mut conn = self.conn.clone();
        if let Some(ttl) = ttl {
            conn.set_ex::<_, _, ()>(key, json, ttl.as_secs())
                .await
                .map_err(|e| SentraError::Downstream(format!("Redis SETEX failed: {e}")))?;
        } else {
            conn.set::<_, _, ()>(key, json)
                .await
                .map_err(|e| SentraError::Downstream(format!("Redis SET failed: {e}")))?;
        }

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        debug!("Cache DELETE: {}", key);

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| SentraError::Downstream(format!("Redis DEL failed: {e}")))?;

        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| SentraError::Downstream(format!("Redis EXISTS failed: {e}")))
    }
}

/// The transient markers dispatch reads and writes, as typed
/// operations. Key layout and TTLs live with the Redis implementation
/// so callers never touch raw keys; tests mock this.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchCache: Send + Sync {
    async fn put_processing_marker(
        &self,
        emergency_id: Uuid,
        marker: &ProcessingMarker,
    ) -> Result<()>;
    async fn processing_marker(&self, emergency_id: Uuid) -> Result<Option<ProcessingMarker>>;
    async fn clear_processing_marker(&self, emergency_id: Uuid) -> Result<()>;
    async fn put_customer_info(
        &self,
        customer_id: Uuid,
        info: &CustomerEmergencyInfo,
    ) -> Result<()>;
}

#[async_trait]
impl DispatchCache for RedisCache {
    async fn put_processing_marker(
        &self,
        emergency_id: Uuid,
        marker: &ProcessingMarker,
    ) -> Result<()> {
        self.set(
            &CacheKeys::emergency_processing(emergency_id),
            marker,
            Some(Duration::from_secs(ProcessingMarker::TTL_SECONDS)),
        )
        .await
    }

    async fn processing_marker(&self, emergency_id: Uuid) -> Result<Option<ProcessingMarker>> {
        self.get(&CacheKeys::emergency_processing(emergency_id))
            .await
    }

    async fn clear_processing_marker(&self, emergency_id: Uuid) -> Result<()> {
        self.delete(&CacheKeys::emergency_processing(emergency_id))
            .await
    }

    async fn put_customer_info(
        &self,
        customer_id: Uuid,
        info: &CustomerEmergencyInfo,
    ) -> Result<()> {
        self.set(
            &CacheKeys::customer_emergency_info(customer_id),
            info,
            Some(Duration::from_secs(CustomerEmergencyInfo::TTL_SECONDS)),
        )
        .await
    }
}

/// Key namespace for every transient marker the platform writes.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    pub fn emergency_processing(emergency_id: Uuid) -> String {
        format!("emergency:{emergency_id}:processing")
    }

    pub fn system_armed(customer_id: Uuid) -> String {
        format!("system:{customer_id}:armed")
    }

    pub fn device_heartbeat(device_id: Uuid) -> String {
        format!("device:{device_id}:heartbeat")
    }

    pub fn customer_status(customer_id: Uuid) -> String {
        format!("customer:{customer_id}:status")
    }

    pub fn customer_emergency_info(customer_id: Uuid) -> String {
        format!("customer:{customer_id}:emergency_info")
    }

    pub fn token_blacklist(jti: &str) -> String {
        format!("blacklist:{jti}")
    }
}
