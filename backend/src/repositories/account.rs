//! Credential store: accounts keyed by email and the sign-in methods bound to them.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::models::account::{normalize_email, Account, LinkedIdentity, NewIdentity};
use crate::models::sign_in_method::SignInMethod;
use crate::types::AccountId;

const TABLE_NAME: &str = "accounts";
const SELECT_COLUMNS: &str = "id, email, display_name, role, created_at, updated_at";
const IDENTITY_COLUMNS: &str = "account_id, method, subject, password_hash, linked_at";

/// Result of binding an identity to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachResult {
    Attached,
    /// The account already has this method.
    AlreadyLinked,
    /// The `(method, subject)` pair belongs to a different account.
    InUseByOtherAccount,
}

/// Result of removing an identity from an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachResult {
    Detached,
    NotLinked,
    /// Removing it would leave the account without any sign-in method.
    LastMethod,
}

/// Repository trait for accounts and their linked identities.
///
/// Use `MockCredentialStore` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> anyhow::Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;

    /// Sign-in methods linked to the account owning `email`, in preference order.
    /// Empty when no account exists.
    async fn methods_for_email(&self, email: &str) -> anyhow::Result<Vec<SignInMethod>>;

    async fn find_by_identity(
        &self,
        method: SignInMethod,
        subject: &str,
    ) -> anyhow::Result<Option<Account>>;

    /// The password identity of the account owning `email`, if any.
    async fn find_password_identity(&self, email: &str)
        -> anyhow::Result<Option<LinkedIdentity>>;

    /// Inserts the account together with its first identity.
    async fn create_account(
        &self,
        account: &Account,
        identity: &NewIdentity,
    ) -> anyhow::Result<Account>;

    async fn attach_identity(
        &self,
        account_id: AccountId,
        identity: &NewIdentity,
    ) -> anyhow::Result<AttachResult>;

    /// Removes the identity unless it is the account's last one. The check and
    /// the delete happen atomically.
    async fn detach_identity(
        &self,
        account_id: AccountId,
        method: SignInMethod,
    ) -> anyhow::Result<DetachResult>;

    /// Returns `false` when the account has no password identity to update.
    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> anyhow::Result<bool>;

    async fn update_display_name(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_methods(&self, account_id: AccountId) -> anyhow::Result<Vec<SignInMethod>> {
        let mut methods: Vec<SignInMethod> =
            sqlx::query_scalar("SELECT method FROM account_identities WHERE account_id = $1")
                .bind(account_id)
                .fetch_all(&self.pool)
                .await
                .context("load linked methods")?;
        methods.sort();
        Ok(methods)
    }

    async fn with_methods(&self, account: Option<Account>) -> anyhow::Result<Option<Account>> {
        match account {
            Some(mut account) => {
                account.methods = self.load_methods(account.id).await?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: AccountId) -> anyhow::Result<Option<Account>> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("find account by id")?;
        self.with_methods(account).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let query = format!("{} WHERE email = $1", Self::base_select_query());
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .context("find account by email")?;
        self.with_methods(account).await
    }

    async fn methods_for_email(&self, email: &str) -> anyhow::Result<Vec<SignInMethod>> {
        let mut methods: Vec<SignInMethod> = sqlx::query_scalar(
            "SELECT i.method FROM account_identities i \
             JOIN accounts a ON a.id = i.account_id \
             WHERE a.email = $1",
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await
        .context("list methods for email")?;
        methods.sort();
        Ok(methods)
    }

    async fn find_by_identity(
        &self,
        method: SignInMethod,
        subject: &str,
    ) -> anyhow::Result<Option<Account>> {
        let query = format!(
            "SELECT a.id, a.email, a.display_name, a.role, a.created_at, a.updated_at \
             FROM {} a JOIN account_identities i ON i.account_id = a.id \
             WHERE i.method = $1 AND i.subject = $2",
            TABLE_NAME
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(method)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .context("find account by identity")?;
        self.with_methods(account).await
    }

    async fn find_password_identity(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<LinkedIdentity>> {
        let query = format!(
            "SELECT {} FROM account_identities \
             WHERE account_id = (SELECT id FROM {} WHERE email = $1) AND method = $2",
            IDENTITY_COLUMNS, TABLE_NAME
        );
        let identity = sqlx::query_as::<_, LinkedIdentity>(&query)
            .bind(normalize_email(email))
            .bind(SignInMethod::Password)
            .fetch_optional(&self.pool)
            .await
            .context("find password identity")?;
        Ok(identity)
    }

    async fn create_account(
        &self,
        account: &Account,
        identity: &NewIdentity,
    ) -> anyhow::Result<Account> {
        let mut tx = self.pool.begin().await.context("begin create account")?;
        let query = format!(
            "INSERT INTO {} (id, email, display_name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let mut created = sqlx::query_as::<_, Account>(&query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.display_name)
            .bind(account.role)
            .bind(account.created_at)
            .bind(account.updated_at)
            .fetch_one(&mut *tx)
            .await
            .context("insert account")?;
        sqlx::query(
            "INSERT INTO account_identities (account_id, method, subject, password_hash, linked_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id)
        .bind(identity.method)
        .bind(&identity.subject)
        .bind(&identity.password_hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("insert first identity")?;
        tx.commit().await.context("commit create account")?;
        created.methods = vec![identity.method];
        Ok(created)
    }

    async fn attach_identity(
        &self,
        account_id: AccountId,
        identity: &NewIdentity,
    ) -> anyhow::Result<AttachResult> {
        let mut tx = self.pool.begin().await.context("begin attach identity")?;

        let owner: Option<AccountId> = sqlx::query_scalar(
            "SELECT account_id FROM account_identities WHERE method = $1 AND subject = $2",
        )
        .bind(identity.method)
        .bind(&identity.subject)
        .fetch_optional(&mut *tx)
        .await
        .context("look up identity owner")?;
        match owner {
            Some(owner) if owner == account_id => return Ok(AttachResult::AlreadyLinked),
            Some(_) => return Ok(AttachResult::InUseByOtherAccount),
            None => {}
        }

        let inserted = sqlx::query(
            "INSERT INTO account_identities (account_id, method, subject, password_hash, linked_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (account_id, method) DO NOTHING",
        )
        .bind(account_id)
        .bind(identity.method)
        .bind(&identity.subject)
        .bind(&identity.password_hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("insert identity")?
        .rows_affected();

        if inserted == 0 {
            return Ok(AttachResult::AlreadyLinked);
        }

        sqlx::query(&format!(
            "UPDATE {} SET updated_at = $2 WHERE id = $1",
            TABLE_NAME
        ))
        .bind(account_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("touch account")?;
        tx.commit().await.context("commit attach identity")?;
        Ok(AttachResult::Attached)
    }

    async fn detach_identity(
        &self,
        account_id: AccountId,
        method: SignInMethod,
    ) -> anyhow::Result<DetachResult> {
        let mut tx = self.pool.begin().await.context("begin detach identity")?;

        // Row lock serialises concurrent unlinks on the same account.
        sqlx::query(&format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", TABLE_NAME))
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock account")?;
        let methods: Vec<SignInMethod> = sqlx::query_scalar(
            "SELECT method FROM account_identities WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await
        .context("count linked methods")?;

        if !methods.contains(&method) {
            return Ok(DetachResult::NotLinked);
        }
        if methods.len() <= 1 {
            return Ok(DetachResult::LastMethod);
        }

        sqlx::query("DELETE FROM account_identities WHERE account_id = $1 AND method = $2")
            .bind(account_id)
            .bind(method)
            .execute(&mut *tx)
            .await
            .context("delete identity")?;
        tx.commit().await.context("commit detach identity")?;
        Ok(DetachResult::Detached)
    }

    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE account_identities SET password_hash = $3 \
             WHERE account_id = $1 AND method = $2",
        )
        .bind(account_id)
        .bind(SignInMethod::Password)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .context("update password hash")?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_display_name(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET display_name = $2, updated_at = $3 WHERE id = $1",
            TABLE_NAME
        ))
        .bind(account_id)
        .bind(display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("update display name")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_match_account_fields() {
        for column in ["id", "email", "display_name", "role", "created_at", "updated_at"] {
            assert!(SELECT_COLUMNS.contains(column));
        }
        assert!(IDENTITY_COLUMNS.contains("password_hash"));
    }

    #[test]
    fn mock_credential_store_is_send_sync() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<MockCredentialStore>();
    }
}
