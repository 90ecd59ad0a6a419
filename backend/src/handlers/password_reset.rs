use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppError,
    models::password_reset::{
        MessageResponse, RequestPasswordResetPayload, ResetPasswordPayload, VerifyResetResponse,
    },
    state::AppState,
};

/// Always answers the same way so callers cannot tell which emails exist.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestPasswordResetPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    state.password_resets.request_reset(&payload).await?;
    Ok(Json(MessageResponse::new(
        "If an account with a password exists for that email, a reset link has been sent",
    )))
}

pub async fn verify_password_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyResetResponse>, AppError> {
    let email = state.password_resets.verify_reset(&token).await?;
    Ok(Json(VerifyResetResponse { email }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    state.password_resets.confirm_reset(&payload).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
