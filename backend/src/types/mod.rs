pub mod id;

pub use id::{AccountId, BookId, OpinionId, PasswordResetId, SessionRecordId};
