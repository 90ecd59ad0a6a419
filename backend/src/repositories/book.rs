//! Book listing repository.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::book::{Book, BookQuery};
use crate::types::BookId;

const TABLE_NAME: &str = "books";
const SELECT_COLUMNS: &str = "id, title, author, category, price, description, condition, \
                              image_previews, seller_id, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert(&self, book: &Book) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: BookId) -> anyhow::Result<Option<Book>>;

    /// Newest first, filtered by `query`.
    async fn list(&self, query: &BookQuery, limit: i64, offset: i64)
        -> anyhow::Result<(Vec<Book>, i64)>;

    /// Returns `false` when the book no longer exists.
    async fn update(&self, book: &Book) -> anyhow::Result<bool>;

    async fn delete(&self, id: BookId) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FILTER_CLAUSE: &str = "WHERE ($1::TEXT IS NULL OR title ILIKE $1 OR author ILIKE $1 \
                             OR description ILIKE $1) \
                             AND ($2::TEXT IS NULL OR category = $2)";

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn insert(&self, book: &Book) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            TABLE_NAME, SELECT_COLUMNS
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(book.price)
        .bind(&book.description)
        .bind(&book.condition)
        .bind(&book.image_previews)
        .bind(book.seller_id)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .context("insert book")?;
        Ok(())
    }

    async fn find_by_id(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            SELECT_COLUMNS, TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find book")?;
        Ok(book)
    }

    async fn list(
        &self,
        query: &BookQuery,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Book>, i64)> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let category = query.category.as_deref().filter(|c| !c.is_empty());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} {}",
            TABLE_NAME, FILTER_CLAUSE
        ))
        .bind(&pattern)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .context("count books")?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM {} {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            SELECT_COLUMNS, TABLE_NAME, FILTER_CLAUSE
        ))
        .bind(&pattern)
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list books")?;
        Ok((books, total))
    }

    async fn update(&self, book: &Book) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET title = $2, author = $3, category = $4, price = $5, \
             description = $6, condition = $7, image_previews = $8, updated_at = $9 \
             WHERE id = $1",
            TABLE_NAME
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(book.price)
        .bind(&book.description)
        .bind(&book.condition)
        .bind(&book.image_previews)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .context("update book")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", TABLE_NAME))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete book")?;
        Ok(result.rows_affected() > 0)
    }
}
