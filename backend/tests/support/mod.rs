#![allow(dead_code)]
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bookstall_backend::{
    build_router,
    config::{Config, SmtpConfig, StorageBackend},
    identity::{oauth::AuthorizationRequest, oauth::OAuthGateway, FederatedIdentity},
    models::{account::OAuthCallbackPayload, sign_in_method::SignInMethod},
    services::AuthError,
    state::{AppState, Stores},
    utils::{cookies::SameSite, email::Mailer},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@bookstall.test";
pub const PASSWORD: &str = "correct-horse";

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        storage_backend: StorageBackend::Memory,
        redis_url: "redis://127.0.0.1:6379".into(),
        redis_pool_size: 1,
        redis_connect_timeout: 1,
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: "test-secret-key-with-enough-length".into(),
        jwt_expiration_hours: 1,
        time_zone: chrono_tz::UTC,
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        frontend_url: "http://localhost:5173".into(),
        cors_allow_origins: vec!["http://localhost:5173".into()],
        cookie_secure: false,
        cookie_same_site: SameSite::Lax,
        login_rate_limit_per_minute: 100,
        oauth_redirect_uri: "http://localhost:5173/auth/callback".into(),
        oauth_clients: Vec::new(),
        smtp: SmtpConfig {
            host: "localhost".into(),
            port: 25,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@bookstall.test".into(),
            skip_send: true,
        },
    }
}

/// Provider stand-in: each authorization code maps to a scripted identity.
#[derive(Default)]
pub struct FakeGateway {
    codes: Mutex<HashMap<String, FederatedIdentity>>,
}

impl FakeGateway {
    pub fn grant(&self, code: &str, method: SignInMethod, subject: &str, email: &str) {
        self.codes.lock().unwrap().insert(
            code.to_string(),
            FederatedIdentity {
                method,
                subject: subject.to_string(),
                email: email.to_string(),
                display_name: Some(format!("{} user", method.display_name())),
            },
        );
    }
}

#[async_trait]
impl OAuthGateway for FakeGateway {
    async fn authorization_url(
        &self,
        method: SignInMethod,
    ) -> Result<AuthorizationRequest, AuthError> {
        Ok(AuthorizationRequest {
            provider: method,
            url: format!("https://{}.example/authorize?state=fake-state", method),
            state: "fake-state".into(),
        })
    }

    async fn exchange(
        &self,
        method: SignInMethod,
        callback: &OAuthCallbackPayload,
    ) -> Result<FederatedIdentity, AuthError> {
        if callback.error.is_some() {
            return Err(AuthError::CancelledByUser);
        }
        let identity = self
            .codes
            .lock()
            .unwrap()
            .remove(&callback.code)
            .ok_or(AuthError::InvalidCredentials)?;
        if identity.method != method {
            return Err(AuthError::InvalidInput(
                "Authorization state does not match the provider".into(),
            ));
        }
        Ok(identity)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    resets: Mutex<Vec<(String, String)>>,
    changes: Mutex<Vec<String>>,
}

impl RecordingMailer {
    pub fn reset_token_for(&self, email: &str) -> Option<String> {
        self.resets
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn reset_count(&self) -> usize {
        self.resets.lock().unwrap().len()
    }

    pub fn changed_notices(&self) -> Vec<String> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, to_email: &str, reset_token: &str) -> anyhow::Result<()> {
        self.resets
            .lock()
            .unwrap()
            .push((to_email.to_string(), reset_token.to_string()));
        Ok(())
    }

    async fn send_password_changed(&self, to_email: &str, _display_name: &str) -> anyhow::Result<()> {
        self.changes.lock().unwrap().push(to_email.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            config,
            Stores::in_memory(),
            gateway.clone(),
            mailer.clone(),
        );
        Self {
            router: build_router(state.clone()),
            state,
            gateway,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn register(&self, email: &str, display_name: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                    "display_name": display_name,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn oauth_sign_in(
        &self,
        method: SignInMethod,
        code: &str,
    ) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            &format!("/api/auth/oauth/{}/sign-in", method),
            None,
            json!({ "code": code, "state": "fake-state" }),
        ))
        .await
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}
