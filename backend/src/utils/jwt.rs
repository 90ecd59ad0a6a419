use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::Account;
use crate::types::{AccountId, SessionRecordId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub email: String,
    pub role: String,
    /// Session record opened at sign-in.
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(account: &Account, session_id: SessionRecordId, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            sub: account.id.to_string(),
            email: account.email.clone(),
            role: account.role.as_str().to_string(),
            sid: session_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn account_id(&self) -> anyhow::Result<AccountId> {
        self.sub
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid subject claim: {}", e))
    }

    pub fn session_id(&self) -> anyhow::Result<SessionRecordId> {
        self.sid
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid session claim: {}", e))
    }
}

pub fn create_access_token(
    account: &Account,
    session_id: SessionRecordId,
    secret: &str,
    expiration_hours: u64,
) -> anyhow::Result<String> {
    let claims = Claims::new(account, session_id, expiration_hours);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn verify_access_token(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}
