use std::time::Duration;

use axum::{
    extract::{Extension, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    error::{AppError, ErrorResponse},
    identity::oauth::{AuthorizationRequest, CodeExchange},
    identity::PreAnsweredConsent,
    models::{
        account::{
            Account, AccountResponse, ChangePasswordRequest, LinkConfirmPayload, LoginRequest,
            LoginResponse, OAuthCallbackPayload, PendingCredential, RegisterPayload,
        },
        password_reset::MessageResponse,
        session_record::SessionContext,
    },
    services::{linking::LinkPlan, sign_in::SignInAttempt, AuthError},
    state::AppState,
    utils::{
        cookies::{build_access_cookie, build_clear_access_cookie},
        jwt::{create_access_token, Claims},
    },
};

use super::federated_provider;

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkConfirmResponse {
    /// `linked` or `already_linked`.
    pub outcome: String,
    #[serde(flatten)]
    pub login: LoginResponse,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Response, AppError> {
    match state.sign_in.attempt_registration(&payload).await? {
        SignInAttempt::SignedIn(account) => {
            let (headers, body) = start_session(&state, account).await?;
            Ok((StatusCode::CREATED, headers, Json(body)).into_response())
        }
        SignInAttempt::Collision(pending) => link_required(&state, pending).await,
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let account = state.sign_in.sign_in_with_password(&payload).await?;
    let (headers, body) = start_session(&state, account).await?;
    Ok((headers, Json(body)).into_response())
}

pub async fn oauth_authorization_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<AuthorizationRequest>, AppError> {
    let method = federated_provider(&provider)?;
    Ok(Json(state.oauth.authorization_url(method).await?))
}

/// Completes a provider redirect. A collision answers `409 LINK_REQUIRED`.
pub async fn oauth_sign_in(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<OAuthCallbackPayload>,
) -> Result<Response, AppError> {
    let method = federated_provider(&provider)?;
    let exchange = CodeExchange::new(state.oauth.clone(), payload);
    match state.sign_in.attempt_federated(method, &exchange).await? {
        SignInAttempt::SignedIn(account) => {
            let (headers, body) = start_session(&state, account).await?;
            Ok((headers, Json(body)).into_response())
        }
        SignInAttempt::Collision(pending) => link_required(&state, pending).await,
    }
}

/// Second step of linking: the user's answer plus a code from the existing provider.
pub async fn confirm_link(
    State(state): State<AppState>,
    Json(payload): Json<LinkConfirmPayload>,
) -> Result<Response, AppError> {
    let callback = if payload.accept {
        match (payload.code, payload.state) {
            (Some(code), Some(oauth_state)) => OAuthCallbackPayload {
                code,
                state: oauth_state,
                error: None,
            },
            _ => {
                return Err(AuthError::InvalidInput(
                    "An authorization code and state are required to link".into(),
                )
                .into())
            }
        }
    } else {
        OAuthCallbackPayload {
            code: String::new(),
            state: String::new(),
            error: None,
        }
    };

    // Claiming is one-shot, so a malformed answer must not burn the token.
    let pending = state
        .pending_links
        .claim(&payload.pending_token)
        .await
        .map_err(AuthError::BackendUnavailable)?
        .ok_or_else(|| AuthError::InvalidInput("The link request has expired".into()))?;

    let exchange = CodeExchange::new(state.oauth.clone(), callback);
    let outcome = state
        .negotiator
        .negotiate(pending, &exchange, &PreAnsweredConsent(payload.accept))
        .await?;
    let label = outcome.as_str().to_string();
    let (headers, login) = start_session(&state, outcome.into_account()).await?;
    Ok((
        headers,
        Json(LinkConfirmResponse {
            outcome: label,
            login,
        }),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = claims
        .session_id()
        .map_err(|_| AppError::Unauthorized("Invalid session".into()))?;
    let mut context = SessionContext::for_session(session_id);
    state.recorder.record_logout(&mut context).await?;

    let mut headers = HeaderMap::new();
    let cookie = build_clear_access_cookie(state.cookie_options());
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    Ok((headers, Json(MessageResponse::new("Signed out"))))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_resets
        .change_password(&account, &payload)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

/// Opens a session record and issues the access token for it.
pub(crate) async fn start_session(
    state: &AppState,
    account: Account,
) -> Result<(HeaderMap, LoginResponse), AppError> {
    let context = state.recorder.record_login(&account).await?;
    let session_id = context
        .session_id()
        .ok_or_else(|| anyhow::anyhow!("session context missing after login"))?;
    let hours = state.config.jwt_expiration_hours;
    let access_token =
        create_access_token(&account, session_id, &state.config.jwt_secret, hours)?;

    let mut headers = HeaderMap::new();
    let cookie = build_access_cookie(
        &access_token,
        Duration::from_secs(hours * 3600),
        state.cookie_options(),
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }

    Ok((
        headers,
        LoginResponse {
            access_token,
            token_type: "Bearer".into(),
            expires_in: (hours * 3600) as i64,
            session_id: session_id.to_string(),
            account: AccountResponse::from(account),
        },
    ))
}

/// Parks `pending` and tells the client which provider proves ownership.
async fn link_required(state: &AppState, pending: PendingCredential) -> Result<Response, AppError> {
    let offer = match state
        .negotiator
        .plan(&pending.email, pending.method())
        .await?
    {
        LinkPlan::AccountExists => return Err(AuthError::AccountExists.into()),
        LinkPlan::RequiresManualLink => return Err(AuthError::RequiresManualLink.into()),
        LinkPlan::Offer(offer) => offer,
    };
    let pending_token = state
        .pending_links
        .park(&pending)
        .await
        .map_err(AuthError::BackendUnavailable)?;

    let body = ErrorResponse::new(
        format!(
            "An account already exists for this email. Sign in with {} to link {}",
            offer.existing_method.display_name(),
            offer.new_method.display_name()
        ),
        "LINK_REQUIRED",
    )
    .with_details(json!({
        "pending_token": pending_token,
        "email": offer.email,
        "existing_method": offer.existing_method,
        "new_method": offer.new_method,
        "expires_in": state.pending_links.ttl().as_secs(),
    }));
    Ok((StatusCode::CONFLICT, Json(body)).into_response())
}
