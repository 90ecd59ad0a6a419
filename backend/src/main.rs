use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstall_backend::{
    build_router,
    config::{Config, StorageBackend},
    db::{connection::create_pool, redis::create_redis_pool},
    identity::oauth::OAuthProviders,
    state::{AppState, Stores},
    utils::email::EmailService,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookstall_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        storage_backend = ?config.storage_backend,
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_expiration_hours = config.jwt_expiration_hours,
        time_zone = %config.time_zone,
        admin_emails = config.admin_emails.len(),
        "Loaded configuration from environment/.env"
    );

    let stores = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url).await?;
            let redis = create_redis_pool(&config).await?;
            Stores::postgres(pool, redis)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Stores::in_memory()
        }
    };

    let oauth = OAuthProviders::from_config(&config, stores.handshakes.clone())?;
    tracing::info!(providers = ?oauth.configured(), "OAuth providers configured");
    let mailer = EmailService::new(&config.smtp, &config.frontend_url)?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, stores, Arc::new(oauth), Arc::new(mailer));
    state.spawn_background_tasks();
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
