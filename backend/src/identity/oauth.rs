//! OAuth 2.0 authorization-code flow with PKCE for Google, Facebook and GitHub.
//!
//! 1. [`OAuthGateway::authorization_url`] builds the provider URL, generating a
//!    random CSRF state and PKCE challenge. State and verifier are parked in
//!    the [`HandshakeStore`] for ten minutes.
//! 2. The frontend receives `code` and `state` on its redirect URI and posts
//!    them back. [`OAuthGateway::exchange`] consumes the state, exchanges the
//!    code with the verifier, and fetches the provider's userinfo.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;
use crate::identity::{FederatedIdentity, InteractiveSignIn};
use crate::models::account::OAuthCallbackPayload;
use crate::models::sign_in_method::SignInMethod;
use crate::services::AuthError;
use crate::repositories::HandshakeStore;

pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationRequest {
    pub provider: SignInMethod,
    pub url: String,
    pub state: String,
}

/// Provider-facing half of federated sign-in.
#[async_trait]
pub trait OAuthGateway: Send + Sync {
    async fn authorization_url(&self, method: SignInMethod)
        -> Result<AuthorizationRequest, AuthError>;

    async fn exchange(
        &self,
        method: SignInMethod,
        callback: &OAuthCallbackPayload,
    ) -> Result<FederatedIdentity, AuthError>;
}

struct ProviderEndpoints {
    auth_url: &'static str,
    token_url: &'static str,
    scopes: &'static [&'static str],
}

fn endpoints(method: SignInMethod) -> Option<ProviderEndpoints> {
    match method {
        SignInMethod::Google => Some(ProviderEndpoints {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            scopes: &["openid", "email", "profile"],
        }),
        SignInMethod::Facebook => Some(ProviderEndpoints {
            auth_url: "https://www.facebook.com/v19.0/dialog/oauth",
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
            scopes: &["email", "public_profile"],
        }),
        SignInMethod::GitHub => Some(ProviderEndpoints {
            auth_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            scopes: &["read:user", "user:email"],
        }),
        SignInMethod::Password => None,
    }
}

#[derive(Serialize, Deserialize)]
struct PendingAuthorization {
    method: SignInMethod,
    pkce_verifier: String,
}

fn state_key(state: &str) -> String {
    format!("oauth_state:{}", state)
}

/// Live gateway talking to the real providers.
pub struct OAuthProviders {
    clients: HashMap<SignInMethod, (ConfiguredClient, &'static [&'static str])>,
    states: Arc<dyn HandshakeStore>,
    http: reqwest::Client,
}

impl OAuthProviders {
    pub fn from_config(config: &Config, states: Arc<dyn HandshakeStore>) -> anyhow::Result<Self> {
        let mut clients = HashMap::new();
        for credentials in &config.oauth_clients {
            let Some(endpoints) = endpoints(credentials.method) else {
                continue;
            };
            let redirect = format!(
                "{}/{}",
                config.oauth_redirect_uri.trim_end_matches('/'),
                credentials.method.as_str()
            );
            let mut client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
                .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
                .set_auth_uri(AuthUrl::new(endpoints.auth_url.to_string())?)
                .set_token_uri(TokenUrl::new(endpoints.token_url.to_string())?)
                .set_redirect_uri(RedirectUrl::new(redirect)?);
            if credentials.method == SignInMethod::Facebook {
                client = client.set_auth_type(AuthType::RequestBody);
            }
            clients.insert(credentials.method, (client, endpoints.scopes));
        }

        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("bookstall-backend")
            .build()?;

        Ok(Self {
            clients,
            states,
            http,
        })
    }

    pub fn configured(&self) -> Vec<SignInMethod> {
        let mut methods: Vec<SignInMethod> = self.clients.keys().copied().collect();
        methods.sort();
        methods
    }

    fn client(&self, method: SignInMethod) -> Result<&(ConfiguredClient, &'static [&'static str]), AuthError> {
        self.clients.get(&method).ok_or_else(|| {
            AuthError::InvalidInput(format!(
                "{} sign-in is not configured",
                method.display_name()
            ))
        })
    }

    async fn fetch_identity(
        &self,
        method: SignInMethod,
        access_token: &str,
    ) -> Result<FederatedIdentity, AuthError> {
        match method {
            SignInMethod::Google => {
                let info: GoogleUserInfo = self
                    .get_json("https://openidconnect.googleapis.com/v1/userinfo", access_token)
                    .await?;
                let verified = info.email_verified.unwrap_or(false);
                identity(method, info.sub, info.email, verified, info.name)
            }
            SignInMethod::Facebook => {
                let info: FacebookUser = self
                    .get_json("https://graph.facebook.com/me?fields=id,name,email", access_token)
                    .await?;
                // Graph has no verification flag and only returns confirmed addresses.
                identity(method, info.id, info.email, true, info.name)
            }
            SignInMethod::GitHub => {
                let user: GitHubUser = self
                    .get_json("https://api.github.com/user", access_token)
                    .await?;
                // A public profile email must be verified on GitHub.
                let email = match user.email {
                    Some(email) => Some(email),
                    None => {
                        let emails: Vec<GitHubEmail> = self
                            .get_json("https://api.github.com/user/emails", access_token)
                            .await?;
                        emails
                            .into_iter()
                            .find(|e| e.primary && e.verified)
                            .map(|e| e.email)
                    }
                };
                identity(
                    method,
                    user.id.to_string(),
                    email,
                    true,
                    user.name.or(Some(user.login)),
                )
            }
            SignInMethod::Password => Err(AuthError::InvalidInput(
                "Password is not an OAuth provider".into(),
            )),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::BackendUnavailable(e.into()))?
            .error_for_status()
            .map_err(|e| AuthError::BackendUnavailable(e.into()))?;
        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::BackendUnavailable(e.into()))
    }
}

fn identity(
    method: SignInMethod,
    subject: String,
    email: Option<String>,
    email_verified: bool,
    display_name: Option<String>,
) -> Result<FederatedIdentity, AuthError> {
    let email = email.filter(|e| !e.trim().is_empty()).ok_or_else(|| {
        AuthError::InvalidInput(format!(
            "{} did not share an email address",
            method.display_name()
        ))
    })?;
    if !email_verified {
        return Err(AuthError::InvalidInput(format!(
            "{} has not verified this email address",
            method.display_name()
        )));
    }
    Ok(FederatedIdentity {
        method,
        subject,
        email,
        display_name,
    })
}

#[async_trait]
impl OAuthGateway for OAuthProviders {
    async fn authorization_url(
        &self,
        method: SignInMethod,
    ) -> Result<AuthorizationRequest, AuthError> {
        let (client, scopes) = self.client(method)?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in scopes.iter() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

        let state = csrf_state.secret().clone();
        let pending = serde_json::to_string(&PendingAuthorization {
            method,
            pkce_verifier: pkce_verifier.secret().clone(),
        })
        .map_err(|e| AuthError::BackendUnavailable(e.into()))?;
        self.states
            .put(&state_key(&state), pending, OAUTH_STATE_TTL)
            .await
            .map_err(AuthError::BackendUnavailable)?;

        Ok(AuthorizationRequest {
            provider: method,
            url: auth_url.to_string(),
            state,
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
        let raw = self
            .states
            .take(&state_key(&callback.state))
            .await
            .map_err(AuthError::BackendUnavailable)?;
        let pending = raw
            .and_then(|raw| serde_json::from_str::<PendingAuthorization>(&raw).ok())
            .filter(|pending| pending.method == method)
            .ok_or_else(|| AuthError::InvalidInput("Invalid or expired OAuth state".into()))?;

        let (client, _) = self.client(method)?;
        let token = client
            .exchange_code(AuthorizationCode::new(callback.code.clone()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(_) => AuthError::InvalidCredentials,
                other => AuthError::BackendUnavailable(anyhow::anyhow!(
                    "Token exchange failed: {}",
                    other
                )),
            })?;

        self.fetch_identity(method, token.access_token().secret())
            .await
    }
}

/// Interactive step backed by an authorization code the frontend already obtained.
///
/// The OAuth state stored with [`OAuthGateway::authorization_url`] pins the
/// provider, so a code issued for one provider cannot satisfy another.
pub struct CodeExchange {
    gateway: Arc<dyn OAuthGateway>,
    callback: OAuthCallbackPayload,
}

impl CodeExchange {
    pub fn new(gateway: Arc<dyn OAuthGateway>, callback: OAuthCallbackPayload) -> Self {
        Self { gateway, callback }
    }
}

#[async_trait]
impl InteractiveSignIn for CodeExchange {
    async fn sign_in(&self, method: SignInMethod) -> Result<FederatedIdentity, AuthError> {
        self.gateway.exchange(method, &self.callback).await
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OAuthClientCredentials, SmtpConfig, StorageBackend};
    use crate::repositories::handshake::MockHandshakeStore;
    use crate::repositories::InMemoryHandshakeStore;
    use crate::utils::cookies::SameSite;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            storage_backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".into(),
            redis_pool_size: 1,
            redis_connect_timeout: 1,
            bind_addr: "127.0.0.1:0".into(),
            jwt_secret: "secret".into(),
            jwt_expiration_hours: 1,
            time_zone: chrono_tz::UTC,
            admin_emails: vec![],
            frontend_url: "http://localhost:5173".into(),
            cors_allow_origins: vec![],
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
            login_rate_limit_per_minute: 5,
            oauth_redirect_uri: "http://localhost:5173/auth/callback".into(),
            oauth_clients: vec![OAuthClientCredentials {
                method: SignInMethod::GitHub,
                client_id: "client".into(),
                client_secret: "secret".into(),
            }],
            smtp: SmtpConfig {
                host: "localhost".into(),
                port: 25,
                username: String::new(),
                password: String::new(),
                from_address: "noreply@bookstall.local".into(),
                skip_send: true,
            },
        }
    }

    fn providers() -> OAuthProviders {
        OAuthProviders::from_config(&config(), Arc::new(InMemoryHandshakeStore::new())).unwrap()
    }

    #[tokio::test]
    async fn authorization_url_carries_pkce_and_state() {
        let providers = providers();
        assert_eq!(providers.configured(), vec![SignInMethod::GitHub]);

        let request = providers
            .authorization_url(SignInMethod::GitHub)
            .await
            .unwrap();
        assert!(request.url.starts_with("https://github.com/login/oauth/authorize"));
        assert!(request.url.contains("code_challenge="));
        assert!(request.url.contains(&format!("state={}", request.state)));
        assert!(request.url.contains("auth%2Fcallback%2Fgithub"));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_rejected() {
        let providers = providers();
        let result = providers.authorization_url(SignInMethod::Google).await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn provider_error_maps_to_cancellation() {
        let providers = providers();
        let callback = OAuthCallbackPayload {
            code: String::new(),
            state: "whatever".into(),
            error: Some("access_denied".into()),
        };
        let result = providers.exchange(SignInMethod::GitHub, &callback).await;
        assert!(matches!(result, Err(AuthError::CancelledByUser)));
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let providers = providers();
        let callback = OAuthCallbackPayload {
            code: "code".into(),
            state: "forged".into(),
            error: None,
        };
        let result = providers.exchange(SignInMethod::GitHub, &callback).await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn state_is_parked_under_a_prefixed_key() {
        let mut states = MockHandshakeStore::new();
        states
            .expect_put()
            .withf(|key, value, ttl| {
                key.starts_with("oauth_state:")
                    && value.contains("pkce_verifier")
                    && *ttl == OAUTH_STATE_TTL
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let providers = OAuthProviders::from_config(&config(), Arc::new(states)).unwrap();

        let request = providers
            .authorization_url(SignInMethod::GitHub)
            .await
            .unwrap();
        assert!(!request.state.is_empty());
    }

    #[tokio::test]
    async fn state_store_outage_is_a_backend_error() {
        let mut states = MockHandshakeStore::new();
        states
            .expect_take()
            .returning(|_| Err(anyhow::anyhow!("redis down")));
        let providers = OAuthProviders::from_config(&config(), Arc::new(states)).unwrap();
        let callback = OAuthCallbackPayload {
            code: "code".into(),
            state: "state".into(),
            error: None,
        };
        let result = providers.exchange(SignInMethod::GitHub, &callback).await;
        assert!(matches!(result, Err(AuthError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn oauth_state_is_pinned_to_its_provider() {
        let providers = providers();
        let request = providers
            .authorization_url(SignInMethod::GitHub)
            .await
            .unwrap();
        let callback = OAuthCallbackPayload {
            code: "code".into(),
            state: request.state,
            error: None,
        };
        let result = providers.exchange(SignInMethod::Google, &callback).await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn identity_requires_an_email() {
        assert!(identity(SignInMethod::Google, "1".into(), None, true, None).is_err());
        let ok = identity(
            SignInMethod::Google,
            "1".into(),
            Some("a@example.com".into()),
            true,
            None,
        )
        .unwrap();
        assert_eq!(ok.subject, "1");
    }

    #[test]
    fn unverified_email_is_rejected() {
        let result = identity(
            SignInMethod::Google,
            "1".into(),
            Some("a@example.com".into()),
            false,
            None,
        );
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn google_userinfo_without_verification_flag_counts_as_unverified() {
        let info: GoogleUserInfo = serde_json::from_value(serde_json::json!({
            "sub": "1",
            "email": "a@example.com",
        }))
        .unwrap();
        assert_eq!(info.email_verified, None);

        let info: GoogleUserInfo = serde_json::from_value(serde_json::json!({
            "sub": "1",
            "email": "a@example.com",
            "email_verified": false,
        }))
        .unwrap();
        assert_eq!(info.email_verified, Some(false));
    }
}
