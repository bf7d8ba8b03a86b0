//! Auth providers.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tradedesk_core::IdentityId;

/// Source of the signed-in backend user.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current user id, or `None` when nobody is signed in.
    async fn current_user(&self) -> SessionResult<Option<IdentityId>>;
}

/// Provider backed by a settable value.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    user: RwLock<Option<IdentityId>>,
}

impl StaticAuthProvider {
    pub fn new(user: Option<IdentityId>) -> Self {
        Self {
            user: RwLock::new(user),
        }
    }

    pub fn sign_in(&self, user: IdentityId) {
        *self.user.write() = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_user(&self) -> SessionResult<Option<IdentityId>> {
        Ok(self.user.read().clone())
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

/// GoTrue-style `GET /auth/v1/user` lookup with a bearer token.
pub struct RestAuthProvider {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestAuthProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> SessionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Auth(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: RwLock::new(access_token),
        })
    }

    /// Replace the session token, e.g. after an interactive sign-in.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn current_user(&self) -> SessionResult<Option<IdentityId>> {
        let token = self.access_token.read().clone();
        let Some(token) = token else {
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Auth(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), "Access token rejected");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Auth(format!("Failed to decode user: {e}")))?;
        Ok(Some(IdentityId::new(user.id)?))
    }
}
