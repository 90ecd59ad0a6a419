//! Book listings offered in the marketplace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::types::{AccountId, BookId};
use crate::validation::rules;

/// Categories a listing can be filed under.
pub const BOOK_CATEGORIES: [&str; 20] = [
    "Fiction",
    "Non-fiction",
    "Science fiction",
    "Fantasy",
    "Mystery",
    "Romance",
    "Horror",
    "Biography",
    "History",
    "Science",
    "Technology",
    "Art",
    "Self-help",
    "Business",
    "Cooking",
    "Travel",
    "Children",
    "Young adult",
    "Poetry",
    "Drama",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub condition: Option<String>,
    /// Image URLs or data URIs, at most five.
    pub image_previews: Vec<String>,
    pub seller_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(seller_id: AccountId, payload: CreateBookPayload) -> Self {
        let now = Utc::now();
        Self {
            id: BookId::new(),
            title: payload.title.trim().to_string(),
            author: payload.author.trim().to_string(),
            category: payload.category,
            price: payload.price,
            description: payload.description.unwrap_or_default(),
            condition: payload.condition.filter(|c| !c.trim().is_empty()),
            image_previews: payload.image_previews,
            seller_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the fields present in `payload`.
    pub fn apply(&mut self, payload: UpdateBookPayload) {
        if let Some(title) = payload.title {
            self.title = title.trim().to_string();
        }
        if let Some(author) = payload.author {
            self.author = author.trim().to_string();
        }
        if let Some(category) = payload.category {
            self.category = category;
        }
        if let Some(price) = payload.price {
            self.price = price;
        }
        if let Some(description) = payload.description {
            self.description = description;
        }
        if let Some(condition) = payload.condition {
            self.condition = Some(condition).filter(|c| !c.trim().is_empty());
        }
        if let Some(images) = payload.image_previews {
            self.image_previews = images;
        }
        self.updated_at = Utc::now();
    }

    /// Case-insensitive match against title, author and description.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.author.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBookPayload {
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub title: String,
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub author: String,
    #[validate(custom(function = "rules::validate_book_category"))]
    pub category: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5, message = "At most 5 images are allowed"))]
    pub image_previews: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateBookPayload {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub category: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub description: Option<String>,
    pub condition: Option<String>,
    #[validate(length(max = 5, message = "At most 5 images are allowed"))]
    pub image_previews: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matches title, author or description.
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub condition: Option<String>,
    pub image_previews: Vec<String>,
    pub seller_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.to_string(),
            title: book.title,
            author: book.author,
            category: book.category,
            price: book.price,
            description: book.description,
            condition: book.condition,
            image_previews: book.image_previews,
            seller_id: book.seller_id.to_string(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}
