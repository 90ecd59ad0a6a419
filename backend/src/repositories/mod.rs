//! Storage traits and their PostgreSQL and in-memory implementations.

pub mod account;
pub mod book;
pub mod handshake;
pub mod memory;
pub mod opinion;
pub mod password_reset;
pub mod session_record;

pub use account::{AttachResult, CredentialStore, DetachResult, PgCredentialStore};
pub use book::{BookRepository, PgBookRepository};
pub use handshake::{HandshakeStore, RedisHandshakeStore};
pub use memory::{
    InMemoryBookRepository, InMemoryCredentialStore, InMemoryHandshakeStore,
    InMemoryOpinionRepository,
    InMemoryPasswordResetStore, InMemorySessionRepository,
};
pub use opinion::{OpinionRepository, PgOpinionRepository};
pub use password_reset::{PasswordResetStore, PgPasswordResetStore};
pub use session_record::{PgSessionRepository, SessionQuery, SessionRepository};
