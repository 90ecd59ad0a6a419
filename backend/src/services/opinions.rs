//! Reader opinions with change notifications for live subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use validator::Validate;

use crate::error::AppError;
use crate::models::account::Account;
use crate::models::opinion::{CreateOpinionPayload, Opinion, OpinionEvent, UpdateOpinionPayload};
use crate::models::PaginationQuery;
use crate::repositories::OpinionRepository;
use crate::types::OpinionId;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct OpinionService {
    repo: Arc<dyn OpinionRepository>,
    events: broadcast::Sender<OpinionEvent>,
}

impl OpinionService {
    pub fn new(repo: Arc<dyn OpinionRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { repo, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OpinionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: OpinionEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    pub async fn create(
        &self,
        author: &Account,
        payload: CreateOpinionPayload,
    ) -> Result<Opinion, AppError> {
        payload.validate()?;
        let username = payload
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| author.display_name.clone());
        let opinion = Opinion::new(author.id, username, payload);
        self.repo.insert(&opinion).await?;
        self.publish(OpinionEvent::Created {
            opinion: opinion.clone().into(),
        });
        Ok(opinion)
    }

    pub async fn get(&self, id: OpinionId) -> Result<Opinion, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Opinion not found".into()))
    }

    pub async fn list(&self, page: &PaginationQuery) -> Result<(Vec<Opinion>, i64), AppError> {
        Ok(self.repo.list(page.limit(), page.offset()).await?)
    }

    pub async fn update(
        &self,
        actor: &Account,
        id: OpinionId,
        payload: UpdateOpinionPayload,
    ) -> Result<Opinion, AppError> {
        payload.validate()?;
        let mut opinion = self.get(id).await?;
        ensure_author(actor, &opinion)?;
        opinion.apply(payload);
        if !self.repo.update(&opinion).await? {
            return Err(AppError::NotFound("Opinion not found".into()));
        }
        self.publish(OpinionEvent::Updated {
            opinion: opinion.clone().into(),
        });
        Ok(opinion)
    }

    pub async fn delete(&self, actor: &Account, id: OpinionId) -> Result<(), AppError> {
        let opinion = self.get(id).await?;
        ensure_author(actor, &opinion)?;
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Opinion not found".into()));
        }
        self.publish(OpinionEvent::Deleted { id: id.to_string() });
        Ok(())
    }
}

fn ensure_author(actor: &Account, opinion: &Opinion) -> Result<(), AppError> {
    if actor.is_admin() || opinion.author_id == actor.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the author can change this opinion".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::AccountRole;
    use crate::repositories::InMemoryOpinionRepository;

    fn payload(score: f64) -> CreateOpinionPayload {
        CreateOpinionPayload {
            username: None,
            book: "Solaris".into(),
            opinion: "Unsettling and brilliant".into(),
            score,
        }
    }

    fn reader() -> Account {
        Account::new("reader@example.com", "Reader", AccountRole::Visitor)
    }

    #[tokio::test]
    async fn username_defaults_to_display_name() {
        let service = OpinionService::new(Arc::new(InMemoryOpinionRepository::new()));
        let opinion = service.create(&reader(), payload(4.0)).await.unwrap();
        assert_eq!(opinion.username, "Reader");
    }

    #[tokio::test]
    async fn scores_outside_zero_to_five_are_rejected() {
        let service = OpinionService::new(Arc::new(InMemoryOpinionRepository::new()));
        assert!(matches!(
            service.create(&reader(), payload(5.5)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let service = OpinionService::new(Arc::new(InMemoryOpinionRepository::new()));
        let mut events = service.subscribe();
        let author = reader();

        let opinion = service.create(&author, payload(3.0)).await.unwrap();
        service
            .update(
                &author,
                opinion.id,
                UpdateOpinionPayload {
                    score: Some(4.5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.delete(&author, opinion.id).await.unwrap();

        let names: Vec<&str> = vec![
            events.recv().await.unwrap().name(),
            events.recv().await.unwrap().name(),
            events.recv().await.unwrap().name(),
        ];
        assert_eq!(names, vec!["created", "updated", "deleted"]);
    }

    #[tokio::test]
    async fn strangers_cannot_delete() {
        let service = OpinionService::new(Arc::new(InMemoryOpinionRepository::new()));
        let opinion = service.create(&reader(), payload(2.0)).await.unwrap();
        let stranger = Account::new("x@example.com", "X", AccountRole::Visitor);
        assert!(matches!(
            service.delete(&stranger, opinion.id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
