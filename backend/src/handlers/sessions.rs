use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::{
    error::AppError, models::session_record::SessionContext, state::AppState, utils::jwt::Claims,
};

/// Closes the caller's session when the page unloads. Returns before the write lands.
pub async fn unload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, AppError> {
    let session_id = claims
        .session_id()
        .map_err(|_| AppError::Unauthorized("Invalid session".into()))?;
    state
        .recorder
        .flush_on_unload(SessionContext::for_session(session_id));
    Ok(StatusCode::ACCEPTED)
}
