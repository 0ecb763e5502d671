//! The upstream challenge platform client.
//!
//! [`ChallengeApi`] is the port the dispatcher depends on; [`RestChallengeApi`] is the production
//! implementation, authenticating with an OAuth2 client-credentials token that is cached until
//! shortly before expiry.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Duration as TokenDuration, Utc};
use log::*;
use reqwest::{Client, StatusCode};
use resource_engine::{
    collaborators::{MembershipError, ProjectMembership},
    db_types::{Challenge, ChallengeId, ResourceRole, ResourceRoleId, UserId},
};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::AuthConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Tokens are refreshed this long before their stated expiry.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Could not initialize the upstream client. {0}")]
    Initialization(String),
    #[error("{0} could not be resolved upstream")]
    NotFound(String),
    #[error("Upstream request failed. {0}")]
    RequestError(String),
    #[error("Could not decode the upstream response. {0}")]
    JsonError(String),
    #[error("Could not obtain an access token. {0}")]
    TokenError(String),
}

#[async_trait]
pub trait ChallengeApi: Send + Sync {
    async fn get_challenge(&self, id: ChallengeId) -> Result<Challenge, UpstreamError>;
    async fn get_resource_role(&self, id: ResourceRoleId) -> Result<ResourceRole, UpstreamError>;
    /// The user's membership role names on the project owning the challenge.
    async fn member_project_roles(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<Vec<String>, UpstreamError>;
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Fetches and caches client-credentials tokens. When no token endpoint is configured, requests go
/// out unauthenticated (useful against local mock servers).
pub struct TokenProvider {
    auth: AuthConfig,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl TokenProvider {
    pub fn new(auth: AuthConfig, client: Client) -> Self {
        Self { auth, client, cached: Mutex::new(None) }
    }

    pub async fn token(&self) -> Result<Option<String>, UpstreamError> {
        if self.auth.token_url.is_empty() {
            return Ok(None);
        }
        let mut cached = self.cached.lock().await;
        if let Some(t) = cached.as_ref() {
            if t.expires_at > Utc::now() + TokenDuration::seconds(TOKEN_EXPIRY_MARGIN_SECS) {
                return Ok(Some(t.token.clone()));
            }
        }
        debug!("🎫️ Fetching a fresh access token from {}", self.auth.token_url);
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.auth.client_id,
            "client_secret": self.auth.client_secret.reveal(),
            "audience": self.auth.audience,
        });
        let response = self
            .client
            .post(&self.auth.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::TokenError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::TokenError(format!("token endpoint returned {}", response.status())));
        }
        let token: TokenResponse = response.json().await.map_err(|e| UpstreamError::TokenError(e.to_string()))?;
        let expires_at = Utc::now() + TokenDuration::seconds(token.expires_in);
        let result = token.access_token.clone();
        *cached = Some(CachedToken { token: token.access_token, expires_at });
        Ok(Some(result))
    }
}

#[derive(Clone)]
pub struct RestChallengeApi {
    base_url: String,
    client: Client,
    tokens: Arc<TokenProvider>,
}

impl RestChallengeApi {
    pub fn new(base_url: &str, auth: AuthConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Initialization(e.to_string()))?;
        let tokens = Arc::new(TokenProvider::new(auth, client.clone()));
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client, tokens })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}{path}", self.base_url);
        trace!("Sending upstream query: {url}");
        let mut req = self.client.get(url);
        if let Some(token) = self.tokens.token().await? {
            req = req.bearer_auth(token);
        }
        let response = req.send().await.map_err(|e| UpstreamError::RequestError(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(UpstreamError::NotFound(path.to_string())),
            s if s.is_success() => response.json::<T>().await.map_err(|e| UpstreamError::JsonError(e.to_string())),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(UpstreamError::RequestError(format!("{s}: {message}")))
            },
        }
    }
}

#[async_trait]
impl ChallengeApi for RestChallengeApi {
    async fn get_challenge(&self, id: ChallengeId) -> Result<Challenge, UpstreamError> {
        self.get_json(&format!("/challenges/{id}")).await
    }

    async fn get_resource_role(&self, id: ResourceRoleId) -> Result<ResourceRole, UpstreamError> {
        self.get_json(&format!("/resource-roles/{id}")).await
    }

    async fn member_project_roles(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<Vec<String>, UpstreamError> {
        self.get_json(&format!("/challenges/{challenge_id}/members/{user_id}/roles")).await
    }
}

/// Adapts [`ChallengeApi`] to the engine's [`ProjectMembership`] port for the manager notification
/// carve-out.
#[derive(Clone)]
pub struct UpstreamMembership {
    api: Arc<dyn ChallengeApi>,
}

impl UpstreamMembership {
    pub fn new(api: Arc<dyn ChallengeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProjectMembership for UpstreamMembership {
    async fn member_roles(&self, user_id: UserId, challenge_id: ChallengeId) -> Result<Vec<String>, MembershipError> {
        self.api.member_project_roles(user_id, challenge_id).await.map_err(|e| MembershipError(e.to_string()))
    }
}
