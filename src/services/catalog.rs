//! Film metadata from the external catalog service.
//!
//! Lookups go through the Redis film cache first; misses hit the catalog
//! over HTTP behind a circuit breaker, so a dead catalog costs one fast
//! rejection per lookup instead of a 30s timeout.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, StateMachine};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::config::{CatalogConfig, CircuitBreakerConfig};
use crate::models::Film;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog circuit breaker is open")]
    CircuitOpen,
}

#[async_trait]
pub trait FilmDirectory: Send + Sync {
    async fn film(&self, film_id: i64) -> Result<Option<Film>, CatalogError>;
}

/// Fixed set of films; used when no catalog URL is configured and in tests.
#[derive(Debug, Default, Clone)]
pub struct StaticFilmDirectory {
    films: HashMap<i64, Film>,
}

impl StaticFilmDirectory {
    pub fn new(films: impl IntoIterator<Item = Film>) -> Self {
        Self {
            films: films.into_iter().map(|f| (f.id, f)).collect(),
        }
    }
}

#[async_trait]
impl FilmDirectory for StaticFilmDirectory {
    async fn film(&self, film_id: i64) -> Result<Option<Film>, CatalogError> {
        Ok(self.films.get(&film_id).cloned())
    }
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

pub struct CatalogClient {
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Breaker,
    cache: Option<CacheService>,
}

impl CatalogClient {
    pub fn from_config(
        config: &CatalogConfig,
        base_url: &str,
        breaker: &CircuitBreakerConfig,
        cache: Option<CacheService>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let policy = failure_policy::consecutive_failures(
            breaker.failure_threshold,
            backoff::constant(Duration::from_secs(breaker.timeout_seconds)),
        );
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker,
            cache,
        })
    }

    async fn request(&self, url: &str) -> Result<Option<Film>, reqwest::Error> {
        let response = self.http_client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.error_for_status()?.json::<Film>().await.map(Some)
    }

    async fn fetch(&self, film_id: i64) -> Result<Option<Film>, CatalogError> {
        let url = format!("{}/films/{}", self.base_url, film_id);

        match self.circuit_breaker.call(self.request(&url)).await {
            Ok(film) => Ok(film),
            Err(failsafe::Error::Inner(e)) => Err(CatalogError::Http(e)),
            Err(failsafe::Error::Rejected) => {
                warn!("Catalog circuit breaker is open, skipping film {}", film_id);
                Err(CatalogError::CircuitOpen)
            }
        }
    }
}

#[async_trait]
impl FilmDirectory for CatalogClient {
    async fn film(&self, film_id: i64) -> Result<Option<Film>, CatalogError> {
        if let Some(cache) = &self.cache {
            if let Some(film) = cache.get_cached_film(film_id).await {
                debug!("Film {} served from cache", film_id);
                return Ok(Some(film));
            }
        }

        let film = self.fetch(film_id).await?;

        if let (Some(cache), Some(film)) = (&self.cache, &film) {
            cache.cache_film(film).await;
        }
        Ok(film)
    }
}
