//! Supabase identity-provider adapter.
//!
//! Access tokens are verified by asking the provider who they belong to
//! (`GET /auth/v1/user`), which keeps signature algorithms and key rotation on
//! the provider's side.

use crate::errors::{AdapterError, AdapterResult};
use crate::http::{build_client, trim_base};
use crate::models::IdentityUser;
use crate::IdentityProvider;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const PROVIDER: &str = "supabase";
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SupabaseIdentity {
    http: Client,
    user_endpoint: String,
    service_key: String,
}

impl SupabaseIdentity {
    pub fn new(url: &str, service_key: &str) -> AdapterResult<Self> {
        if url.trim().is_empty() || service_key.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "identity provider not configured".to_string(),
            ));
        }
        Ok(Self {
            http: build_client(PROVIDER, VERIFY_TIMEOUT)?,
            user_endpoint: format!("{}/auth/v1/user", trim_base(url)),
            service_key: service_key.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn verify_token(&self, token: &str) -> AdapterResult<IdentityUser> {
        let response = self
            .http
            .get(&self.user_endpoint)
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AdapterError::transport(PROVIDER, err))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_client_error() {
            return Err(token_error(&body));
        }
        if !status.is_success() {
            error!("Token verification error: HTTP {status}");
            return Err(AdapterError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        let user = parse_user(&body)?;
        debug!("Token verified for user: {}", user.email);
        Ok(user)
    }
}

fn token_error(body: &Value) -> AdapterError {
    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("no user found")
        .to_string();
    if message.to_lowercase().contains("expired") {
        AdapterError::TokenExpired
    } else {
        AdapterError::InvalidToken(message)
    }
}

pub(crate) fn parse_user(body: &Value) -> AdapterResult<IdentityUser> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::InvalidToken("no user found".to_string()))?;
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let metadata = body.get("user_metadata");
    let metadata_str = |key: &str| {
        metadata
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Ok(IdentityUser {
        id: id.to_string(),
        email: email.to_lowercase(),
        role: body
            .get("role")
            .and_then(Value::as_str)
            .filter(|role| !role.is_empty())
            .unwrap_or("authenticated")
            .to_string(),
        display_name: metadata_str("full_name").or_else(|| metadata_str("name")),
        avatar_url: metadata_str("avatar_url"),
    })
}
