//! Session log: one record per sign-in, closed at sign-out or page unload.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::account::Account;
use crate::models::session_record::{
    duration_seconds, SessionContext, SessionFilter, SessionRecord, SessionSort, SessionSummary,
};
use crate::repositories::{SessionQuery, SessionRepository};
use crate::types::{AccountId, SessionRecordId};

#[derive(Clone)]
pub struct SessionRecorder {
    repo: Arc<dyn SessionRepository>,
    time_zone: Tz,
}

impl SessionRecorder {
    pub fn new(repo: Arc<dyn SessionRepository>, time_zone: Tz) -> Self {
        Self { repo, time_zone }
    }

    pub fn time_zone(&self) -> &Tz {
        &self.time_zone
    }

    /// Opens a record for `account` and hands the caller its context.
    pub async fn record_login(&self, account: &Account) -> anyhow::Result<SessionContext> {
        let mut providers = account.methods.clone();
        providers.sort();
        let record = SessionRecord::open(
            account.id,
            &account.email,
            &account.display_name,
            providers,
            Utc::now(),
        );
        self.repo.insert(&record).await?;
        tracing::info!(
            account_id = %account.id,
            session_id = %record.id,
            "Session opened"
        );
        Ok(SessionContext::for_session(record.id))
    }

    pub async fn record_logout(&self, context: &mut SessionContext) -> anyhow::Result<()> {
        self.record_logout_at(context, Utc::now()).await
    }

    /// Closes the session in `context` as of `at` and clears the context.
    ///
    /// No-op for an empty context or a record that is already closed.
    pub async fn record_logout_at(
        &self,
        context: &mut SessionContext,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let Some(session_id) = context.session_id() else {
            return Ok(());
        };
        let Some(record) = self.repo.find_by_id(session_id).await? else {
            tracing::warn!(session_id = %session_id, "Logout for unknown session");
            context.take();
            return Ok(());
        };

        if record.is_active() {
            let duration = duration_seconds(record.login_at, at);
            if self.repo.close(session_id, at, duration).await? {
                tracing::info!(
                    account_id = %record.account_id,
                    session_id = %session_id,
                    duration_seconds = duration,
                    "Session closed"
                );
            }
        }
        context.take();
        Ok(())
    }

    /// Best-effort close for a page that is going away; errors are only logged.
    pub fn flush_on_unload(&self, mut context: SessionContext) {
        if context.is_empty() {
            return;
        }
        let recorder = self.clone();
        tokio::spawn(async move {
            if let Err(err) = recorder.record_logout(&mut context).await {
                tracing::warn!(error = %err, "Failed to close session on unload");
            }
        });
    }

    pub async fn is_active(&self, session_id: SessionRecordId) -> anyhow::Result<bool> {
        Ok(self
            .repo
            .find_by_id(session_id)
            .await?
            .is_some_and(|record| record.is_active()))
    }

    pub async fn list(
        &self,
        filter: &SessionFilter,
        sort: SessionSort,
    ) -> anyhow::Result<Vec<SessionRecord>> {
        let query = SessionQuery {
            email_fragment: filter.email_fragment(),
            window: filter.window(&self.time_zone),
        };
        let mut records = self.repo.list(&query).await?;
        sort.apply(&mut records);
        Ok(records)
    }

    pub async fn list_for_account(
        &self,
        account_id: AccountId,
    ) -> anyhow::Result<Vec<SessionRecord>> {
        self.repo.list_for_account(account_id).await
    }

    pub async fn summary(&self, filter: &SessionFilter) -> anyhow::Result<SessionSummary> {
        let records = self.list(filter, SessionSort::default()).await?;
        Ok(SessionSummary::from_records(&records))
    }
}
