//! Book listings: anyone can browse, sellers manage their own listings.

use std::sync::Arc;

use validator::Validate;

use crate::error::AppError;
use crate::models::account::Account;
use crate::models::book::{Book, BookQuery, CreateBookPayload, UpdateBookPayload};
use crate::models::PaginationQuery;
use crate::repositories::BookRepository;
use crate::types::BookId;
use crate::validation::rules;

#[derive(Clone)]
pub struct BookService {
    repo: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, seller: &Account, payload: CreateBookPayload) -> Result<Book, AppError> {
        payload.validate()?;
        let book = Book::new(seller.id, payload);
        self.repo.insert(&book).await?;
        tracing::info!(book_id = %book.id, seller_id = %seller.id, "Book listed");
        Ok(book)
    }

    pub async fn get(&self, id: BookId) -> Result<Book, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".into()))
    }

    pub async fn list(
        &self,
        query: &BookQuery,
        page: &PaginationQuery,
    ) -> Result<(Vec<Book>, i64), AppError> {
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            rules::validate_book_category(category)
                .map_err(|_| AppError::BadRequest(format!("Unknown category: {}", category)))?;
        }
        Ok(self.repo.list(query, page.limit(), page.offset()).await?)
    }

    pub async fn update(
        &self,
        actor: &Account,
        id: BookId,
        payload: UpdateBookPayload,
    ) -> Result<Book, AppError> {
        payload.validate()?;
        if let Some(category) = payload.category.as_deref() {
            rules::validate_book_category(category)
                .map_err(|_| AppError::BadRequest(format!("Unknown category: {}", category)))?;
        }

        let mut book = self.get(id).await?;
        ensure_can_manage(actor, &book)?;
        book.apply(payload);
        if !self.repo.update(&book).await? {
            return Err(AppError::NotFound("Book not found".into()));
        }
        Ok(book)
    }

    pub async fn delete(&self, actor: &Account, id: BookId) -> Result<(), AppError> {
        let book = self.get(id).await?;
        ensure_can_manage(actor, &book)?;
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Book not found".into()));
        }
        tracing::info!(book_id = %id, actor_id = %actor.id, "Book removed");
        Ok(())
    }
}

fn ensure_can_manage(actor: &Account, book: &Book) -> Result<(), AppError> {
    if actor.is_admin() || book.seller_id == actor.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the seller can change this listing".into(),
        ))
    }
}
