use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::services::pricing::TierPrices;

// Top-level configuration, one section per concern.
//
// Values come from built-in defaults overridden by `CINEMA_`-prefixed
// environment variables with `__` between section and key, e.g.
// `CINEMA_APP__PORT=8080`, `CINEMA_PRICING__VIP_FROM_ROW=M`. The usual
// `DATABASE_URL`, `REDIS_URL`, `PORT` and `RUST_LOG` win over both.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub pricing: PricingConfig,
    pub reservation: ReservationConfig,
    pub catalog: CatalogConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// `pretty` or `json`
    pub log_format: String,
}

// Without a URL the service keeps reservations in memory only.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// Without a URL the film cache is disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub standard: i64,
    pub vip: i64,
    pub vip_from_row: char,
    /// Extra price tables selected by a seance's price key.
    #[serde(default)]
    pub tiers: HashMap<String, TierPrices>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    pub max_seats: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub film_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(
                config::Environment::with_prefix("CINEMA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?
            .set_override_option("app.port", env::var("PORT").ok())?
            .set_override_option("app.rust_log", env::var("RUST_LOG").ok())?
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "cinema_booking=debug,tower_http=debug")?
            .set_default("app.log_format", "pretty")?
            .set_default("database.pool_size", 20)?
            .set_default("jwt.secret", "change-me")?
            .set_default("pricing.standard", 500)?
            .set_default("pricing.vip", 800)?
            .set_default("pricing.vip_from_row", "M")?
            .set_default("reservation.max_seats", 8)?
            .set_default("catalog.timeout_seconds", 5)?
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.timeout_seconds", 60)?
            .set_default("cache.film_ttl_seconds", 3600)
    }

    /// Defaults only, ignoring the environment.
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }
}
