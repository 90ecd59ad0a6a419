use std::time::Duration;

use bb8::Pool;
use bb8_redis::RedisConnectionManager;

use crate::config::Config;

pub type RedisPool = Pool<RedisConnectionManager>;

pub async fn create_redis_pool(config: &Config) -> anyhow::Result<RedisPool> {
    let manager = RedisConnectionManager::new(config.redis_url.clone())?;
    let pool = Pool::builder()
        .max_size(config.redis_pool_size)
        .connection_timeout(Duration::from_secs(config.redis_connect_timeout))
        .build(manager)
        .await?;

    tracing::info!(pool_size = config.redis_pool_size, "Redis connection pool created");
    Ok(pool)
}
