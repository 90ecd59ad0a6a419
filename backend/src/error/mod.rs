//! HTTP error type shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::services::AuthError;

/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
    Auth(AuthError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
            AppError::Auth(err) => (auth_status(err), err.code()),
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidInput(_)
        | AuthError::LastSignInMethod
        | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::AccountExists
        | AuthError::RequiresManualLink
        | AuthError::CancelledByUser
        | AuthError::CredentialInUse => StatusCode::CONFLICT,
        AuthError::MethodNotLinked(_) => StatusCode::NOT_FOUND,
        AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AuthError::InconsistentAccount => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg) => ErrorResponse::new(msg, code),
            AppError::Validation(errors) => ErrorResponse::new("Validation failed", code)
                .with_details(json!({ "errors": errors })),
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "Internal server error");
                ErrorResponse::new("Internal server error", code)
            }
            AppError::Auth(err) => {
                if status.is_server_error() {
                    tracing::error!(code, error = ?err, "Authentication flow failed");
                }
                let body = ErrorResponse::new(err.to_string(), code);
                match err.details() {
                    Some(details) => body.with_details(details),
                    None => body,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            other => AppError::InternalServerError(other.into()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        // HashMap iteration order is not stable.
        messages.sort();
        AppError::Validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sign_in_method::SignInMethod;

    async fn body_of(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn plain_variants_keep_their_message() {
        let cases = [
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("nope".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("denied".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::NotFound("missing".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
        ];
        for (error, expected_status, expected_code) in cases {
            let (status, json) = body_of(error).await;
            assert_eq!(status, expected_status);
            assert_eq!(json["code"], expected_code);
            assert!(json["error"].as_str().is_some_and(|m| !m.is_empty()));
            assert!(json.get("details").is_none());
        }
    }

    #[tokio::test]
    async fn validation_lists_field_messages() {
        let (status, json) = body_of(AppError::Validation(vec!["price: negative".into()])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["errors"][0], "price: negative");
    }

    #[tokio::test]
    async fn auth_errors_carry_their_own_codes() {
        let (status, json) = body_of(AuthError::RequiresManualLink.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "REQUIRES_MANUAL_LINK");

        let (status, json) = body_of(AuthError::LastSignInMethod.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "LAST_SIGN_IN_METHOD");

        let (status, _) = body_of(AuthError::RateLimited.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, json) =
            body_of(AuthError::MethodNotLinked(SignInMethod::GitHub).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["details"]["method"], "github");

        let (status, _) = body_of(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) =
            body_of(AuthError::BackendUnavailable(anyhow::anyhow!("db down")).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "BACKEND_UNAVAILABLE");
        assert!(!json["error"].as_str().unwrap().contains("db down"));
    }

    #[tokio::test]
    async fn internal_errors_hide_the_cause() {
        let (status, json) = body_of(AppError::InternalServerError(anyhow::anyhow!("boom"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(json["details"].is_null());
    }
}
