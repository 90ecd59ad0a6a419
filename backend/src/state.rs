use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::{
    config::Config,
    db::redis::RedisPool,
    identity::oauth::OAuthGateway,
    repositories::{
        BookRepository, CredentialStore, HandshakeStore, InMemoryBookRepository,
        InMemoryCredentialStore, InMemoryHandshakeStore, InMemoryOpinionRepository,
        InMemoryPasswordResetStore, InMemorySessionRepository, OpinionRepository,
        PasswordResetStore, PgBookRepository, PgCredentialStore, PgOpinionRepository,
        PgPasswordResetStore, PgSessionRepository, RedisHandshakeStore, SessionRepository,
    },
    services::{
        books::BookService, linking::LinkingNegotiator, opinions::OpinionService,
        password_reset::PasswordResetService, pending_link::PendingLinkStore,
        session_recorder::SessionRecorder, sign_in::SignInHandler,
    },
    utils::{cookies::CookieOptions, email::Mailer},
};

pub const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Storage backends the services are wired to.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionRepository>,
    pub books: Arc<dyn BookRepository>,
    pub opinions: Arc<dyn OpinionRepository>,
    pub password_resets: Arc<dyn PasswordResetStore>,
    /// OAuth state and parked link credentials.
    pub handshakes: Arc<dyn HandshakeStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool, redis: RedisPool) -> Self {
        Self {
            credentials: Arc::new(PgCredentialStore::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            books: Arc::new(PgBookRepository::new(pool.clone())),
            opinions: Arc::new(PgOpinionRepository::new(pool.clone())),
            password_resets: Arc::new(PgPasswordResetStore::new(pool)),
            handshakes: Arc::new(RedisHandshakeStore::new(redis)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            books: Arc::new(InMemoryBookRepository::new()),
            opinions: Arc::new(InMemoryOpinionRepository::new()),
            password_resets: Arc::new(InMemoryPasswordResetStore::new()),
            handshakes: Arc::new(InMemoryHandshakeStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<dyn CredentialStore>,
    pub sign_in: SignInHandler,
    pub negotiator: LinkingNegotiator,
    pub recorder: SessionRecorder,
    pub books: BookService,
    pub opinions: OpinionService,
    pub password_resets: PasswordResetService,
    pub oauth: Arc<dyn OAuthGateway>,
    pub pending_links: PendingLinkStore,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        oauth: Arc<dyn OAuthGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let negotiator = LinkingNegotiator::new(stores.credentials.clone());
        let sign_in = SignInHandler::new(
            stores.credentials.clone(),
            negotiator.clone(),
            config.admin_emails.clone(),
            config.login_rate_limit_per_minute,
        );
        let recorder = SessionRecorder::new(stores.sessions.clone(), config.time_zone);
        let password_resets = PasswordResetService::new(
            stores.password_resets.clone(),
            stores.credentials.clone(),
            mailer,
        );

        Self {
            credentials: stores.credentials,
            sign_in,
            negotiator,
            recorder,
            books: BookService::new(stores.books),
            opinions: OpinionService::new(stores.opinions),
            password_resets,
            oauth,
            pending_links: PendingLinkStore::new(stores.handshakes),
            config,
        }
    }

    /// Starts housekeeping that runs for the lifetime of the server.
    pub fn spawn_background_tasks(&self) {
        self.sign_in
            .spawn_rate_limit_pruning(RATE_LIMIT_PRUNE_INTERVAL);
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.config.cookie_secure,
            same_site: self.config.cookie_same_site,
        }
    }
}
