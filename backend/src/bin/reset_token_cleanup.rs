use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstall_backend::{
    config::Config,
    db::connection::create_pool,
    repositories::{PasswordResetStore, PgPasswordResetStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reset_token_cleanup=info,bookstall_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let deleted_count = PgPasswordResetStore::new(pool.clone())
        .delete_expired(Utc::now())
        .await?;
    if deleted_count > 0 {
        tracing::info!("Deleted {} expired password reset tokens", deleted_count);
    }

    sqlx::query("VACUUM (ANALYZE) password_resets")
        .execute(&pool)
        .await?;

    Ok(())
}
