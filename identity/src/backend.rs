//! Portal REST backend: profile and organization endpoints.
//!
//! SYSTEM CONTEXT
//! ==============
//! The resolvers depend on [`BackendApi`], not on HTTP. [`HttpBackend`] is
//! the production implementation; tests swap in in-memory fakes.
//!
//! The base URL is chosen per request: when a debug override is active it
//! wins over the configured URL, so toggling it needs no client rebuild.

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::PortalConfig;
use crate::debug::DebugOverrideStore;
use crate::error::BackendError;
use crate::organization::Organization;

/// Raw profile payload (`GET /profiles/me`). Every field is optional on the
/// wire; [`crate::profile::UserProfile::from_backend`] applies the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role_id: Option<i64>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub organization_id: Option<i64>,
}

/// Body of `PUT /profiles/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait BackendApi: Send + Sync {
    /// Current user's profile. `Ok(None)` means the user has no portal
    /// profile yet and must onboard.
    async fn fetch_profile(&self, access_token: &str) -> Result<Option<BackendProfile>, BackendError>;

    async fn update_profile(&self, access_token: &str, update: &ProfileUpdate) -> Result<(), BackendError>;

    async fn fetch_organization(&self, access_token: &str, organization_id: i64) -> Result<Organization, BackendError>;
}

// =============================================================================
// HTTP BACKEND
// =============================================================================

pub struct HttpBackend {
    http: reqwest::Client,
    default_base_url: String,
    overrides: Option<DebugOverrideStore>,
}

impl HttpBackend {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &PortalConfig) -> Result<Self, BackendError> {
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder
            .timeout(std::time::Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(std::time::Duration::from_secs(config.timeouts.connect_secs));
        let http = builder.build().map_err(BackendError::from)?;
        Ok(Self { http, default_base_url: config.backend_url.clone(), overrides: None })
    }

    /// Consult `store` on every request for a debug backend URL.
    #[must_use]
    pub fn with_debug_override(mut self, store: DebugOverrideStore) -> Self {
        self.overrides = Some(store);
        self
    }

    /// Base URL the next request will use.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.overrides
            .as_ref()
            .and_then(DebugOverrideStore::active_backend_url)
            .unwrap_or_else(|| self.default_base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, BackendError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), body));
        }
        Ok(resp.text().await?)
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl BackendApi for HttpBackend {
    async fn fetch_profile(&self, access_token: &str) -> Result<Option<BackendProfile>, BackendError> {
        let resp = self
            .http
            .get(self.url("/profiles/me"))
            .bearer_auth(access_token)
            .send()
            .await?;
        let body = Self::read_body(resp).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Self::decode(&body)
    }

    async fn update_profile(&self, access_token: &str, update: &ProfileUpdate) -> Result<(), BackendError> {
        let resp = self
            .http
            .put(self.url("/profiles/me"))
            .bearer_auth(access_token)
            .json(update)
            .send()
            .await?;
        Self::read_body(resp).await?;
        Ok(())
    }

    async fn fetch_organization(&self, access_token: &str, organization_id: i64) -> Result<Organization, BackendError> {
        let resp = self
            .http
            .get(self.url(&format!("/organizations/{organization_id}")))
            .bearer_auth(access_token)
            .send()
            .await?;
        let body = Self::read_body(resp).await?;
        Self::decode(&body)
    }
}
