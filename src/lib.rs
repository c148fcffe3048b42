pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{NaiveTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::middleware::TokenVerifier;
use crate::models::Seance;
use crate::services::catalog::{CatalogClient, FilmDirectory, StaticFilmDirectory};
use crate::services::coordinator::{ReservationCoordinator, ReservationRules};
use crate::services::ledger::{InMemoryLedger, ReservationLedger};
use crate::services::pricing::PricingPolicy;
use crate::services::query::QueryFacade;

// Shared state for the whole application
pub struct AppState {
    pub coordinator: Arc<ReservationCoordinator>,
    pub query: QueryFacade,
    pub tokens: TokenVerifier,
    pub config: config::Config,
    pub db: Option<database::Database>,
    pub redis: Option<redis_client::RedisClient>,
}

impl AppState {
    /// Connects to the configured backends and restores every seance's
    /// seat map from the ledger before the server accepts requests.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = match &config.database.url {
            Some(url) => {
                let db = database::Database::new(url, config.database.pool_size).await?;
                db.run_migrations().await?;
                info!("Database connected");
                Some(db)
            }
            None => {
                warn!("DATABASE_URL not set, reservations are kept in memory only");
                None
            }
        };

        let redis = match &config.redis.url {
            Some(url) => match redis_client::RedisClient::new(url).await {
                Ok(redis) => {
                    info!("Redis connected");
                    Some(redis)
                }
                Err(e) => {
                    warn!("Redis unavailable, film cache disabled: {:?}", e);
                    None
                }
            },
            None => None,
        };

        let films: Arc<dyn FilmDirectory> = match &config.catalog.base_url {
            Some(url) => {
                let cache = redis
                    .clone()
                    .map(|r| cache::CacheService::new(r, config.cache.film_ttl_seconds));
                Arc::new(CatalogClient::from_config(
                    &config.catalog,
                    url,
                    &config.circuit_breaker,
                    cache,
                )?)
            }
            None => {
                warn!("Film catalog URL not set, film titles fall back to ids");
                Arc::new(StaticFilmDirectory::default())
            }
        };

        let ledger: Arc<dyn ReservationLedger> = match &db {
            Some(db) => Arc::new(db.clone()),
            None => Arc::new(InMemoryLedger::new()),
        };

        let state = Self::assemble(config, ledger, films, db, redis);
        state.restore_seances().await?;
        Ok(state)
    }

    /// Wires the core around an existing ledger and film directory.
    pub fn assemble(
        config: config::Config,
        ledger: Arc<dyn ReservationLedger>,
        films: Arc<dyn FilmDirectory>,
        db: Option<database::Database>,
        redis: Option<redis_client::RedisClient>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(ReservationCoordinator::new(
            ledger,
            PricingPolicy::from_config(&config.pricing),
            ReservationRules::from(&config.reservation),
        ));
        let query = QueryFacade::new(coordinator.clone(), films);
        let tokens = TokenVerifier::new(&config.jwt.secret);

        Arc::new(Self {
            coordinator,
            query,
            tokens,
            config,
            db,
            redis,
        })
    }

    async fn restore_seances(&self) -> anyhow::Result<()> {
        let seances = match &self.db {
            Some(db) => db.load_seances().await?,
            None => vec![demo_seance()],
        };

        let ids: Vec<_> = seances.iter().map(|s| s.id).collect();
        let results = join_all(
            seances
                .into_iter()
                .map(|seance| self.coordinator.restore_seance(seance)),
        )
        .await;

        let mut restored = 0;
        for (seance_id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(applied) => {
                    restored += 1;
                    if applied > 0 {
                        info!("Seance {}: {} reservations restored", seance_id, applied);
                    }
                }
                Err(e) => error!("Seance {} could not be restored: {}", seance_id, e),
            }
        }
        info!("Seat maps ready for {} seances", restored);
        Ok(())
    }
}

/// Hall used when running without a database: rows A-P, 23 seats each.
pub fn demo_seance() -> Seance {
    let time = NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default();
    Seance::with_grid(1, 1, Utc::now().date_naive(), time, 'A'..='P', 23)
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let db_healthy = match &state.db {
        Some(db) => Some(db.ping().await),
        None => None,
    };
    let redis_healthy = match &state.redis {
        Some(redis) => Some(redis.ping().await),
        None => None,
    };
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "db_healthy": db_healthy,
        "redis_healthy": redis_healthy,
    }))
}
