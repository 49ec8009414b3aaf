use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Server configuration, layered from defaults, an optional TOML file
/// and `SENTRA_*` environment overrides (`SENTRA_DATABASE__URL`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8443_i64)?
            .set_default("database.max_connections", 10_i64)?
            .set_default("database.acquire_timeout_secs", 5_i64)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("auth.access_ttl_secs", 900_i64)?
            .set_default("auth.refresh_ttl_secs", 604_800_i64)?
            .set_default::<_, Vec<String>>("cors.allowed_origins", Vec::new())?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SENTRA")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_sections() {
        // Required values provided the way deployment does, via env.
        unsafe {
            std::env::set_var("SENTRA_DATABASE__URL", "postgres://localhost/sentra_test");
            std::env::set_var("SENTRA_AUTH__JWT_SECRET", "test-secret");
            std::env::set_var("SENTRA_AUTH__JWT_REFRESH_SECRET", "test-refresh-secret");
        }

        let config = Config::load(None).expect("config should load from env");
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert!(config.cors.allowed_origins.is_empty());
    }
}
