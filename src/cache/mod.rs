use crate::redis_client::RedisClient;

pub mod films;

/// Redis-backed cache for data owned by external services.
///
/// Seat availability is never cached here: the coordinator's seat map is
/// the only copy.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    film_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, film_ttl_seconds: u64) -> Self {
        Self {
            redis,
            film_ttl_seconds,
        }
    }
}
