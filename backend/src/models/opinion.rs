//! Reader opinions about books.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{AccountId, OpinionId};
use crate::validation::rules;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Opinion {
    pub id: OpinionId,
    pub username: String,
    /// Title of the reviewed book as typed by the reader.
    pub book: String,
    pub opinion: String,
    pub score: f64,
    pub author_id: AccountId,
    pub date: DateTime<Utc>,
}

impl Opinion {
    pub fn new(author_id: AccountId, username: String, payload: CreateOpinionPayload) -> Self {
        Self {
            id: OpinionId::new(),
            username,
            book: payload.book.trim().to_string(),
            opinion: payload.opinion.trim().to_string(),
            score: payload.score,
            author_id,
            date: Utc::now(),
        }
    }

    pub fn apply(&mut self, payload: UpdateOpinionPayload) {
        if let Some(username) = payload.username {
            self.username = username.trim().to_string();
        }
        if let Some(book) = payload.book {
            self.book = book.trim().to_string();
        }
        if let Some(opinion) = payload.opinion {
            self.opinion = opinion.trim().to_string();
        }
        if let Some(score) = payload.score {
            self.score = score;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOpinionPayload {
    /// Defaults to the author's display name.
    #[serde(default)]
    pub username: Option<String>,
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub book: String,
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub opinion: String,
    #[validate(range(min = 0.0, max = 5.0, message = "Score must be between 0 and 5"))]
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOpinionPayload {
    #[validate(length(min = 1, message = "Username cannot be empty"))]
    pub username: Option<String>,
    #[validate(length(min = 1, message = "Book cannot be empty"))]
    pub book: Option<String>,
    #[validate(length(min = 1, message = "Opinion cannot be empty"))]
    pub opinion: Option<String>,
    #[validate(range(min = 0.0, max = 5.0, message = "Score must be between 0 and 5"))]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpinionResponse {
    pub id: String,
    pub username: String,
    pub book: String,
    pub opinion: String,
    pub score: f64,
    pub author_id: String,
    pub date: DateTime<Utc>,
}

impl From<Opinion> for OpinionResponse {
    fn from(opinion: Opinion) -> Self {
        Self {
            id: opinion.id.to_string(),
            username: opinion.username,
            book: opinion.book,
            opinion: opinion.opinion,
            score: opinion.score,
            author_id: opinion.author_id.to_string(),
            date: opinion.date,
        }
    }
}

/// Change notification pushed to opinion subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpinionEvent {
    Created { opinion: OpinionResponse },
    Updated { opinion: OpinionResponse },
    Deleted { id: String },
}

impl OpinionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OpinionEvent::Created { .. } => "created",
            OpinionEvent::Updated { .. } => "updated",
            OpinionEvent::Deleted { .. } => "deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_must_stay_within_zero_and_five() {
        let payload = CreateOpinionPayload {
            username: None,
            book: "Dune".into(),
            opinion: "Great".into(),
            score: 5.5,
        };
        assert!(payload.validate().is_err());

        let payload = CreateOpinionPayload { score: 0.0, ..payload };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn events_are_tagged() {
        let event = OpinionEvent::Deleted { id: "abc".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["id"], "abc");
    }
}
