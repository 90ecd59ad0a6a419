use std::convert::Infallible;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::AppError,
    models::{
        account::Account,
        opinion::{CreateOpinionPayload, OpinionEvent, OpinionResponse, UpdateOpinionPayload},
        PaginatedResponse, PaginationQuery,
    },
    state::AppState,
    types::OpinionId,
};

use super::parse_id;

pub async fn list_opinions(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<OpinionResponse>>, AppError> {
    let (opinions, total) = state.opinions.list(&page).await?;
    Ok(Json(PaginatedResponse::for_page(opinions, total, &page)))
}

pub async fn get_opinion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OpinionResponse>, AppError> {
    let id: OpinionId = parse_id(&id, "opinion")?;
    Ok(Json(state.opinions.get(id).await?.into()))
}

pub async fn create_opinion(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<CreateOpinionPayload>,
) -> Result<(StatusCode, Json<OpinionResponse>), AppError> {
    let opinion = state.opinions.create(&account, payload).await?;
    Ok((StatusCode::CREATED, Json(opinion.into())))
}

pub async fn update_opinion(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOpinionPayload>,
) -> Result<Json<OpinionResponse>, AppError> {
    let id: OpinionId = parse_id(&id, "opinion")?;
    let opinion = state.opinions.update(&account, id, payload).await?;
    Ok(Json(opinion.into()))
}

pub async fn delete_opinion(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: OpinionId = parse_id(&id, "opinion")?;
    state.opinions.delete(&account, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent events for opinion changes. Each event is named after its kind.
pub async fn stream_opinions(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(opinion_events(state.opinions.subscribe())).keep_alive(KeepAlive::default())
}

fn opinion_events(
    receiver: broadcast::Receiver<OpinionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let frame = match Event::default().event(event.name()).json_data(&event) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::warn!(error = %err, "Failed to encode opinion event");
                            continue;
                        }
                    };
                    return Some((Ok::<_, Infallible>(frame), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Opinion subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
