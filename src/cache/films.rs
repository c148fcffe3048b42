use crate::cache::CacheService;
use crate::models::Film;
use redis::AsyncCommands;
use tracing::warn;

pub(crate) fn film_key(film_id: i64) -> String {
    format!("film:{}", film_id)
}

impl CacheService {
    /// Film from cache; any Redis or decode failure counts as a miss.
    pub async fn get_cached_film(&self, film_id: i64) -> Option<Film> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get(film_key(film_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Film cache read failed for {}: {:?}", film_id, e);
                return None;
            }
        };
        data.and_then(|json| serde_json::from_str(&json).ok())
    }

    pub async fn cache_film(&self, film: &Film) {
        let data = match serde_json::to_string(film) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize film {}: {:?}", film.id, e);
                return;
            }
        };
        let mut conn = self.redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn
            .set_ex(film_key(film.id), data, self.film_ttl_seconds)
            .await;
        if let Err(e) = result {
            warn!("Failed to cache film {}: {:?}", film.id, e);
        }
    }
}
