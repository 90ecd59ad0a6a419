use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppError,
    models::account::{Account, AccountResponse, OAuthCallbackPayload, SetPasswordPayload},
    services::linking::LinkOutcome,
    state::AppState,
};

use super::federated_provider;

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkMethodResponse {
    /// `linked` or `already_linked`.
    pub outcome: String,
    pub account: AccountResponse,
}

impl From<LinkOutcome> for LinkMethodResponse {
    fn from(outcome: LinkOutcome) -> Self {
        Self {
            outcome: outcome.as_str().to_string(),
            account: AccountResponse::from(outcome.into_account()),
        }
    }
}

pub async fn me(Extension(account): Extension<Account>) -> Json<AccountResponse> {
    Json(AccountResponse::from(account))
}

/// Links another provider after the signed-in user completed its redirect.
pub async fn link_provider(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(provider): Path<String>,
    Json(payload): Json<OAuthCallbackPayload>,
) -> Result<Json<LinkMethodResponse>, AppError> {
    let method = federated_provider(&provider)?;
    let identity = state.oauth.exchange(method, &payload).await?;
    let outcome = state.negotiator.link_method(&account, identity).await?;
    Ok(Json(outcome.into()))
}

pub async fn set_password(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<SetPasswordPayload>,
) -> Result<Json<LinkMethodResponse>, AppError> {
    payload.validate()?;
    let outcome = state
        .negotiator
        .set_password(&account, &payload.password)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn unlink_method(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(method): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let method = method
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unsupported sign-in method: {}", method)))?;
    let account = state.negotiator.unlink_method(&account, method).await?;
    Ok(Json(AccountResponse::from(account)))
}
