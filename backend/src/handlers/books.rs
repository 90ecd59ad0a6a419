use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::{
        account::Account,
        book::{BookQuery, BookResponse, CreateBookPayload, UpdateBookPayload},
        PaginatedResponse, PaginationQuery,
    },
    state::AppState,
    types::BookId,
};

use super::parse_id;

pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<BookResponse>>, AppError> {
    let (books, total) = state.books.list(&query, &page).await?;
    Ok(Json(PaginatedResponse::for_page(books, total, &page)))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let id: BookId = parse_id(&id, "book")?;
    Ok(Json(state.books.get(id).await?.into()))
}

pub async fn create_book(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<CreateBookPayload>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let book = state.books.create(&account, payload).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

pub async fn update_book(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBookPayload>,
) -> Result<Json<BookResponse>, AppError> {
    let id: BookId = parse_id(&id, "book")?;
    let book = state.books.update(&account, id, payload).await?;
    Ok(Json(book.into()))
}

pub async fn delete_book(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: BookId = parse_id(&id, "book")?;
    state.books.delete(&account, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
