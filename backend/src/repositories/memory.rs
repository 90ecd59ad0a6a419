//! In-memory storage implementations.
//!
//! Used by the test suites and by `STORAGE_BACKEND=memory` for local runs
//! without PostgreSQL. Each store keeps its whole state behind one lock so
//! multi-step operations stay atomic.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::models::account::{normalize_email, Account, LinkedIdentity, NewIdentity};
use crate::models::book::{Book, BookQuery};
use crate::models::opinion::Opinion;
use crate::models::password_reset::PasswordReset;
use crate::models::session_record::SessionRecord;
use crate::models::sign_in_method::SignInMethod;
use crate::repositories::account::{AttachResult, CredentialStore, DetachResult};
use crate::repositories::book::BookRepository;
use crate::repositories::handshake::HandshakeStore;
use crate::repositories::opinion::OpinionRepository;
use crate::repositories::password_reset::PasswordResetStore;
use crate::repositories::session_record::{SessionQuery, SessionRepository};
use crate::types::{AccountId, BookId, OpinionId, PasswordResetId, SessionRecordId};

#[derive(Default)]
struct CredentialState {
    accounts: HashMap<AccountId, Account>,
    identities: Vec<LinkedIdentity>,
}

impl CredentialState {
    fn methods_of(&self, account_id: AccountId) -> Vec<SignInMethod> {
        let mut methods: Vec<SignInMethod> = self
            .identities
            .iter()
            .filter(|identity| identity.account_id == account_id)
            .map(|identity| identity.method)
            .collect();
        methods.sort();
        methods
    }

    fn hydrated(&self, account: &Account) -> Account {
        let mut account = account.clone();
        account.methods = self.methods_of(account.id);
        account
    }

    fn by_email(&self, email: &str) -> Option<&Account> {
        let email = normalize_email(email);
        self.accounts.values().find(|account| account.email == email)
    }
}

/// In-memory credential store.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<CredentialState>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_id(&self, id: AccountId) -> anyhow::Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).map(|account| state.hydrated(account)))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.by_email(email).map(|account| state.hydrated(account)))
    }

    async fn methods_for_email(&self, email: &str) -> anyhow::Result<Vec<SignInMethod>> {
        let state = self.state.read().await;
        Ok(state
            .by_email(email)
            .map(|account| state.methods_of(account.id))
            .unwrap_or_default())
    }

    async fn find_by_identity(
        &self,
        method: SignInMethod,
        subject: &str,
    ) -> anyhow::Result<Option<Account>> {
        let state = self.state.read().await;
        let owner = state
            .identities
            .iter()
            .find(|identity| identity.method == method && identity.subject == subject)
            .map(|identity| identity.account_id);
        Ok(owner
            .and_then(|id| state.accounts.get(&id))
            .map(|account| state.hydrated(account)))
    }

    async fn find_password_identity(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<LinkedIdentity>> {
        let state = self.state.read().await;
        let Some(account) = state.by_email(email) else {
            return Ok(None);
        };
        Ok(state
            .identities
            .iter()
            .find(|identity| {
                identity.account_id == account.id && identity.method == SignInMethod::Password
            })
            .cloned())
    }

    async fn create_account(
        &self,
        account: &Account,
        identity: &NewIdentity,
    ) -> anyhow::Result<Account> {
        let mut state = self.state.write().await;
        if state.by_email(&account.email).is_some() {
            anyhow::bail!("account with email {} already exists", account.email);
        }
        if state
            .identities
            .iter()
            .any(|existing| existing.method == identity.method && existing.subject == identity.subject)
        {
            anyhow::bail!("identity {}:{} already bound", identity.method, identity.subject);
        }
        let mut stored = account.clone();
        stored.email = normalize_email(&account.email);
        stored.methods = Vec::new();
        state.accounts.insert(stored.id, stored.clone());
        state.identities.push(LinkedIdentity {
            account_id: stored.id,
            method: identity.method,
            subject: identity.subject.clone(),
            password_hash: identity.password_hash.clone(),
            linked_at: Utc::now(),
        });
        Ok(state.hydrated(&stored))
    }

    async fn attach_identity(
        &self,
        account_id: AccountId,
        identity: &NewIdentity,
    ) -> anyhow::Result<AttachResult> {
        let mut state = self.state.write().await;
        if !state.accounts.contains_key(&account_id) {
            anyhow::bail!("account {} does not exist", account_id);
        }
        if let Some(owner) = state
            .identities
            .iter()
            .find(|existing| existing.method == identity.method && existing.subject == identity.subject)
            .map(|existing| existing.account_id)
        {
            return Ok(if owner == account_id {
                AttachResult::AlreadyLinked
            } else {
                AttachResult::InUseByOtherAccount
            });
        }
        if state.methods_of(account_id).contains(&identity.method) {
            return Ok(AttachResult::AlreadyLinked);
        }
        state.identities.push(LinkedIdentity {
            account_id,
            method: identity.method,
            subject: identity.subject.clone(),
            password_hash: identity.password_hash.clone(),
            linked_at: Utc::now(),
        });
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.updated_at = Utc::now();
        }
        Ok(AttachResult::Attached)
    }

    async fn detach_identity(
        &self,
        account_id: AccountId,
        method: SignInMethod,
    ) -> anyhow::Result<DetachResult> {
        let mut state = self.state.write().await;
        let methods = state.methods_of(account_id);
        if !methods.contains(&method) {
            return Ok(DetachResult::NotLinked);
        }
        if methods.len() <= 1 {
            return Ok(DetachResult::LastMethod);
        }
        state
            .identities
            .retain(|identity| !(identity.account_id == account_id && identity.method == method));
        Ok(DetachResult::Detached)
    }

    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let mut state = self.state.write().await;
        let identity = state.identities.iter_mut().find(|identity| {
            identity.account_id == account_id && identity.method == SignInMethod::Password
        });
        Ok(match identity {
            Some(identity) => {
                identity.password_hash = Some(password_hash.to_string());
                true
            }
            None => false,
        })
    }

    async fn update_display_name(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.display_name = display_name.to_string();
            account.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory session log.
#[derive(Default)]
pub struct InMemorySessionRepository {
    records: RwLock<HashMap<SessionRecordId, SessionRecord>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut records: Vec<SessionRecord>) -> Vec<SessionRecord> {
    records.sort_by(|a, b| b.login_at.cmp(&a.login_at));
    records
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SessionRecordId) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn close(
        &self,
        id: SessionRecordId,
        logout_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(false);
        };
        if !record.close(logout_at) {
            return Ok(false);
        }
        record.duration_seconds = Some(duration_seconds.max(0));
        Ok(true)
    }

    async fn list(&self, query: &SessionQuery) -> anyhow::Result<Vec<SessionRecord>> {
        let records = self.records.read().await;
        let matching = records
            .values()
            .filter(|record| match &query.email_fragment {
                Some(fragment) => record.email.to_lowercase().contains(fragment.as_str()),
                None => true,
            })
            .filter(|record| query.window.from.map_or(true, |from| record.login_at >= from))
            .filter(|record| query.window.until.map_or(true, |until| record.login_at < until))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> anyhow::Result<Vec<SessionRecord>> {
        let records = self.records.read().await;
        let matching = records
            .values()
            .filter(|record| record.account_id == account_id)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }
}

fn page<T: Clone>(items: &[T], limit: i64, offset: i64) -> Vec<T> {
    items
        .iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

/// In-memory book listings.
#[derive(Default)]
pub struct InMemoryBookRepository {
    books: RwLock<HashMap<BookId, Book>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn insert(&self, book: &Book) -> anyhow::Result<()> {
        self.books.write().await.insert(book.id, book.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        Ok(self.books.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        query: &BookQuery,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Book>, i64)> {
        let books = self.books.read().await;
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let category = query.category.as_deref().filter(|c| !c.is_empty());
        let mut matching: Vec<Book> = books
            .values()
            .filter(|book| search.map_or(true, |needle| book.matches_search(needle)))
            .filter(|book| category.map_or(true, |category| book.category == category))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        Ok((page(&matching, limit, offset), total))
    }

    async fn update(&self, book: &Book) -> anyhow::Result<bool> {
        let mut books = self.books.write().await;
        match books.get_mut(&book.id) {
            Some(existing) => {
                *existing = book.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        Ok(self.books.write().await.remove(&id).is_some())
    }
}

/// In-memory opinions.
#[derive(Default)]
pub struct InMemoryOpinionRepository {
    opinions: RwLock<HashMap<OpinionId, Opinion>>,
}

impl InMemoryOpinionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OpinionRepository for InMemoryOpinionRepository {
    async fn insert(&self, opinion: &Opinion) -> anyhow::Result<()> {
        self.opinions.write().await.insert(opinion.id, opinion.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OpinionId) -> anyhow::Result<Option<Opinion>> {
        Ok(self.opinions.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Opinion>, i64)> {
        let opinions = self.opinions.read().await;
        let mut all: Vec<Opinion> = opinions.values().cloned().collect();
        all.sort_by(|a, b| b.date.cmp(&a.date));
        let total = all.len() as i64;
        Ok((page(&all, limit, offset), total))
    }

    async fn update(&self, opinion: &Opinion) -> anyhow::Result<bool> {
        let mut opinions = self.opinions.write().await;
        match opinions.get_mut(&opinion.id) {
            Some(existing) => {
                *existing = opinion.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: OpinionId) -> anyhow::Result<bool> {
        Ok(self.opinions.write().await.remove(&id).is_some())
    }
}

/// In-memory password reset tokens.
#[derive(Default)]
pub struct InMemoryPasswordResetStore {
    resets: RwLock<HashMap<PasswordResetId, PasswordReset>>,
}

impl InMemoryPasswordResetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordResetStore for InMemoryPasswordResetStore {
    async fn create(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<PasswordReset> {
        let reset = PasswordReset {
            id: PasswordResetId::new(),
            account_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
            used_at: None,
        };
        self.resets.write().await.insert(reset.id, reset.clone());
        Ok(reset)
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordReset>> {
        let resets = self.resets.read().await;
        Ok(resets
            .values()
            .find(|reset| reset.token_hash == token_hash)
            .cloned())
    }

    async fn mark_used(
        &self,
        id: PasswordResetId,
        used_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut resets = self.resets.write().await;
        match resets.get_mut(&id) {
            Some(reset) if reset.used_at.is_none() => {
                reset.used_at = Some(used_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut resets = self.resets.write().await;
        let before = resets.len();
        resets.retain(|_, reset| reset.expires_at >= now);
        Ok((before - resets.len()) as u64)
    }
}

/// In-memory handshake state. Expired entries are pruned on every write.
#[derive(Default)]
pub struct InMemoryHandshakeStore {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl InMemoryHandshakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandshakeStore for InMemoryHandshakeStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, (expires_at, _)| *expires_at > now);
        entries.insert(key.to_string(), (now + ttl, value));
        Ok(())
    }

    async fn take(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .filter(|(expires_at, _)| *expires_at > Instant::now())
            .map(|(_, value)| value))
    }
}
