use std::{fmt, sync::Arc};

use sqlx::PgPool;

use sentra_core::cache::RedisCache;
use sentra_core::database::{
    PostgresCustomerRepository, PostgresDeviceRepository, PostgresEmergencyRepository,
};
use sentra_core::dispatch::DispatchContext;

use crate::auth::AuthKeys;
use crate::infra::config::Config;
use crate::realtime::{ArmScheduler, PresenceRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub cache: RedisCache,
    pub emergencies: Arc<PostgresEmergencyRepository>,
    pub devices: Arc<PostgresDeviceRepository>,
    pub customers: Arc<PostgresCustomerRepository>,
    pub registry: Arc<PresenceRegistry>,
    pub arm_scheduler: Arc<ArmScheduler>,
    pub auth: Arc<AuthKeys>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, cache: RedisCache) -> Self {
        let auth = Arc::new(AuthKeys::from_config(&config.auth));
        Self {
            config: Arc::new(config),
            emergencies: Arc::new(PostgresEmergencyRepository::new(pool.clone())),
            devices: Arc::new(PostgresDeviceRepository::new(pool.clone())),
            customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
            registry: Arc::new(PresenceRegistry::new()),
            arm_scheduler: Arc::new(ArmScheduler::new()),
            auth,
            pool,
            cache,
        }
    }

    /// Explicit context for the dispatch orchestrator; nothing is
    /// captured implicitly.
    pub fn dispatch_ctx(&self) -> DispatchContext<'_> {
        DispatchContext {
            emergencies: self.emergencies.as_ref(),
            customers: self.customers.as_ref(),
            cache: &self.cache,
            events: self.registry.as_ref(),
        }
    }
}
