//! Session log persistence.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::session_record::{LoginWindow, SessionRecord, SessionStatus};
use crate::models::sign_in_method::SignInMethod;
use crate::types::{AccountId, SessionRecordId};

const TABLE_NAME: &str = "session_records";
const SELECT_COLUMNS: &str = "id, account_id, email, display_name, providers, login_at, \
                              logout_at, duration_seconds, status";

/// Criteria pushed down to the store; sorting happens in the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Lower-cased email fragment.
    pub email_fragment: Option<String>,
    pub window: LoginWindow,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, record: &SessionRecord) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: SessionRecordId) -> anyhow::Result<Option<SessionRecord>>;

    /// Closes an active record. Returns `false` when it is missing or already closed.
    async fn close(
        &self,
        id: SessionRecordId,
        logout_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> anyhow::Result<bool>;

    /// Matching records, newest login first.
    async fn list(&self, query: &SessionQuery) -> anyhow::Result<Vec<SessionRecord>>;

    /// Records of one account, newest login first.
    async fn list_for_account(&self, account_id: AccountId)
        -> anyhow::Result<Vec<SessionRecord>>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: SessionRecordId,
    account_id: AccountId,
    email: String,
    display_name: String,
    providers: Vec<String>,
    login_at: DateTime<Utc>,
    logout_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    status: SessionStatus,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        let providers = row
            .providers
            .iter()
            .filter_map(|provider| provider.parse::<SignInMethod>().ok())
            .collect();
        SessionRecord {
            id: row.id,
            account_id: row.account_id,
            email: row.email,
            display_name: row.display_name,
            providers,
            login_at: row.login_at,
            logout_at: row.logout_at,
            duration_seconds: row.duration_seconds,
            status: row.status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, record: &SessionRecord) -> anyhow::Result<()> {
        let providers: Vec<String> = record
            .providers
            .iter()
            .map(|method| method.as_str().to_string())
            .collect();
        sqlx::query(&format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            TABLE_NAME, SELECT_COLUMNS
        ))
        .bind(record.id)
        .bind(record.account_id)
        .bind(&record.email)
        .bind(&record.display_name)
        .bind(providers)
        .bind(record.login_at)
        .bind(record.logout_at)
        .bind(record.duration_seconds)
        .bind(record.status)
        .execute(&self.pool)
        .await
        .context("insert session record")?;
        Ok(())
    }

    async fn find_by_id(&self, id: SessionRecordId) -> anyhow::Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find session record")?;
        Ok(row.map(SessionRecord::from))
    }

    async fn close(
        &self,
        id: SessionRecordId,
        logout_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET logout_at = $2, duration_seconds = $3, status = $4 \
             WHERE id = $1 AND status = $5",
            TABLE_NAME
        ))
        .bind(id)
        .bind(logout_at)
        .bind(duration_seconds.max(0))
        .bind(SessionStatus::Inactive)
        .bind(SessionStatus::Active)
        .execute(&self.pool)
        .await
        .context("close session record")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &SessionQuery) -> anyhow::Result<Vec<SessionRecord>> {
        let pattern = query
            .email_fragment
            .as_ref()
            .map(|fragment| format!("%{}%", escape_like(fragment)));
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM {} \
             WHERE ($1::TEXT IS NULL OR email ILIKE $1 ESCAPE '\\') \
             AND ($2::TIMESTAMPTZ IS NULL OR login_at >= $2) \
             AND ($3::TIMESTAMPTZ IS NULL OR login_at < $3) \
             ORDER BY login_at DESC",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(pattern)
        .bind(query.window.from)
        .bind(query.window.until)
        .fetch_all(&self.pool)
        .await
        .context("list session records")?;
        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }

    async fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> anyhow::Result<Vec<SessionRecord>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM {} WHERE account_id = $1 ORDER BY login_at DESC",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .context("list account session records")?;
        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }
}

/// Escapes `%`, `_` and the escape character itself for use inside `LIKE`.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
