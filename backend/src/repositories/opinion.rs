//! Opinion repository.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::opinion::Opinion;
use crate::types::OpinionId;

const TABLE_NAME: &str = "opinions";
const SELECT_COLUMNS: &str = "id, username, book, opinion, score, author_id, date";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OpinionRepository: Send + Sync {
    async fn insert(&self, opinion: &Opinion) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: OpinionId) -> anyhow::Result<Option<Opinion>>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Opinion>, i64)>;

    async fn update(&self, opinion: &Opinion) -> anyhow::Result<bool>;

    async fn delete(&self, id: OpinionId) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
pub struct PgOpinionRepository {
    pool: PgPool,
}

impl PgOpinionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpinionRepository for PgOpinionRepository {
    async fn insert(&self, opinion: &Opinion) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            TABLE_NAME, SELECT_COLUMNS
        ))
        .bind(opinion.id)
        .bind(&opinion.username)
        .bind(&opinion.book)
        .bind(&opinion.opinion)
        .bind(opinion.score)
        .bind(opinion.author_id)
        .bind(opinion.date)
        .execute(&self.pool)
        .await
        .context("insert opinion")?;
        Ok(())
    }

    async fn find_by_id(&self, id: OpinionId) -> anyhow::Result<Option<Opinion>> {
        let opinion = sqlx::query_as::<_, Opinion>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find opinion")?;
        Ok(opinion)
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<Opinion>, i64)> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME))
            .fetch_one(&self.pool)
            .await
            .context("count opinions")?;
        let opinions = sqlx::query_as::<_, Opinion>(&format!(
            "SELECT {} FROM {} ORDER BY date DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list opinions")?;
        Ok((opinions, total))
    }

    async fn update(&self, opinion: &Opinion) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET username = $2, book = $3, opinion = $4, score = $5 WHERE id = $1",
            TABLE_NAME
        ))
        .bind(opinion.id)
        .bind(&opinion.username)
        .bind(&opinion.book)
        .bind(&opinion.opinion)
        .bind(opinion.score)
        .execute(&self.pool)
        .await
        .context("update opinion")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: OpinionId) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", TABLE_NAME))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete opinion")?;
        Ok(result.rows_affected() > 0)
    }
}
