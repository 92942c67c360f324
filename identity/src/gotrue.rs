//! HTTP session store for a GoTrue-compatible identity provider.
//!
//! SYSTEM CONTEXT
//! ==============
//! Talks to `{identity_url}/auth/v1`. Every request carries the project's
//! anon key as the `apikey` header; user-scoped calls add the session's
//! bearer token.
//!
//! DESIGN
//! ======
//! The current session lives in a [`SessionHub`] and is mirrored to the
//! key-value store under [`keys::SESSION`] on every change, so a restart can
//! [`GoTrueStore::restore`] it. Sessions are refreshed lazily: any
//! `get_session` within [`REFRESH_MARGIN_SECS`] of expiry refreshes first.
//! Concurrent callers share one refresh.
//!
//! ERROR HANDLING
//! ==============
//! A failed refresh ends the session (`SignedOut`) rather than handing out a
//! token the backend will reject. Storage failures are logged and never fail
//! an auth call; the in-memory session stays authoritative.

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use url::form_urlencoded;

use crate::clock::Clock;
use crate::config::PortalConfig;
use crate::error::AuthError;
use crate::session::{Session, SessionEvent, SessionEventKind, SessionHub, SessionStore, SignUpFields};
use crate::storage::{KeyValueStore, keys};

/// Refresh this many seconds before the access token expires.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the provider omits both `expires_at` and `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ProviderUser,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Map<String, Value>,
}

fn expiry(expires_at: Option<i64>, expires_in: Option<i64>, now_secs: i64) -> i64 {
    expires_at.unwrap_or_else(|| now_secs.saturating_add(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)))
}

fn build_session(user: ProviderUser, access_token: String, refresh_token: String, expires_at: i64) -> Session {
    Session {
        user_id: user.id,
        email: user.email.unwrap_or_default(),
        access_token,
        refresh_token,
        expires_at,
        metadata: user.user_metadata,
    }
}

impl TokenResponse {
    fn into_session(self, now_secs: i64) -> Session {
        let expires_at = expiry(self.expires_at, self.expires_in, now_secs);
        build_session(self.user, self.access_token, self.refresh_token, expires_at)
    }
}

/// Tokens handed back in the URL fragment of an email link
/// (`#access_token=...&refresh_token=...&expires_in=3600&type=recovery`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub kind: Option<String>,
}

impl RedirectTokens {
    /// Parse a URL fragment or query string. `None` unless both tokens are
    /// present.
    #[must_use]
    pub fn parse(fragment: &str) -> Option<Self> {
        let mut tokens = Self::default();
        let trimmed = fragment.trim().trim_start_matches(['#', '?']);
        for (key, value) in form_urlencoded::parse(trimmed.as_bytes()) {
            match key.as_ref() {
                "access_token" => tokens.access_token = value.into_owned(),
                "refresh_token" => tokens.refresh_token = value.into_owned(),
                "expires_in" => tokens.expires_in = value.parse().ok(),
                "expires_at" => tokens.expires_at = value.parse().ok(),
                "type" => tokens.kind = Some(value.into_owned()),
                _ => {}
            }
        }
        (!tokens.access_token.is_empty() && !tokens.refresh_token.is_empty()).then_some(tokens)
    }

    #[must_use]
    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct GoTrueStore {
    http: reqwest::Client,
    auth_url: String,
    recovery_redirect: Option<String>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    hub: SessionHub,
    refreshing: tokio::sync::Mutex<()>,
}

impl GoTrueStore {
    /// Build a store for the configured provider. No session is loaded until
    /// [`GoTrueStore::restore`] runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the anon key is not a valid header value or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &PortalConfig, storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(&config.identity_anon_key)
            .map_err(|e| AuthError::Unknown(format!("invalid anon key: {e}")))?;
        headers.insert("apikey", apikey);

        let builder = reqwest::Client::builder().default_headers(headers);
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder
            .timeout(std::time::Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(std::time::Duration::from_secs(config.timeouts.connect_secs));
        let http = builder.build().map_err(AuthError::from)?;

        Ok(Self {
            http,
            auth_url: config.identity_auth_url(),
            recovery_redirect: None,
            storage,
            clock,
            hub: SessionHub::new(),
            refreshing: tokio::sync::Mutex::new(()),
        })
    }

    /// Where password-reset emails should send the user back to.
    #[must_use]
    pub fn with_recovery_redirect(mut self, url: impl Into<String>) -> Self {
        self.recovery_redirect = Some(url.into());
        self
    }

    /// Load the persisted session, refreshing it if it is about to expire,
    /// and announce the result as `InitialSession`.
    pub async fn restore(&self) -> Option<Session> {
        let stored = self.storage.get(keys::SESSION).and_then(|raw| {
            serde_json::from_str::<Session>(&raw)
                .inspect_err(|e| tracing::warn!(error = %e, "discarding unreadable stored session"))
                .ok()
        });

        let now = self.clock.now_secs();
        let session = match stored {
            Some(s) if s.expires_within(now, REFRESH_MARGIN_SECS) => match self.request_refresh(&s.refresh_token).await {
                Ok(fresh) => Some(fresh),
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %s.user_id, "stored session could not be refreshed");
                    None
                }
            },
            other => other,
        };

        self.set_current(SessionEventKind::InitialSession, session.clone());
        session
    }

    /// Establish a session from an email-link redirect. Recovery links
    /// announce `PasswordRecovery`; anything else is a sign-in.
    pub async fn set_session_from_redirect(&self, fragment: &str) -> Result<Session, AuthError> {
        let tokens =
            RedirectTokens::parse(fragment).ok_or_else(|| AuthError::Unknown("redirect carries no session".into()))?;
        let user: ProviderUser = self.fetch_user(&tokens.access_token).await?;
        let expires_at = expiry(tokens.expires_at, tokens.expires_in, self.clock.now_secs());
        let kind = if tokens.is_recovery() { SessionEventKind::PasswordRecovery } else { SessionEventKind::SignedIn };
        let session = build_session(user, tokens.access_token, tokens.refresh_token, expires_at);
        self.set_current(kind, Some(session.clone()));
        Ok(session)
    }

    /// Keep the session fresh in the background. Abort the handle to stop.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_auto_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let mut events = self.hub.subscribe();
        tokio::spawn(async move {
            loop {
                let due = store.hub.current().map(|s| {
                    let secs = s.expires_at - REFRESH_MARGIN_SECS - store.clock.now_secs();
                    std::time::Duration::from_secs(u64::try_from(secs).unwrap_or(0))
                });
                let closed = match due {
                    Some(delay) => tokio::select! {
                        () = tokio::time::sleep(delay) => {
                            store.get_session().await;
                            false
                        }
                        event = events.recv() => matches!(event, Err(broadcast::error::RecvError::Closed)),
                    },
                    None => matches!(events.recv().await, Err(broadcast::error::RecvError::Closed)),
                };
                if closed {
                    break;
                }
            }
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.auth_url)
    }

    /// Persist then publish. Persistence failures only log.
    fn set_current(&self, kind: SessionEventKind, session: Option<Session>) {
        let persisted = match &session {
            Some(s) => serde_json::to_string(s)
                .map_err(Into::into)
                .and_then(|raw| self.storage.set(keys::SESSION, &raw)),
            None => self.storage.remove(keys::SESSION),
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "failed to persist session");
        }
        tracing::debug!(?kind, user_id = session.as_ref().map(|s| s.user_id.as_str()), "session changed");
        self.hub.publish(kind, session);
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::from_response(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| AuthError::Unknown(format!("unexpected provider response: {e}")))
    }

    async fn expect_success(resp: reqwest::Response) -> Result<(), AuthError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AuthError::from_response(status.as_u16(), &body))
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.url("/token?grant_type=refresh_token"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let tokens: TokenResponse = Self::read(resp).await?;
        Ok(tokens.into_session(self.clock.now_secs()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, AuthError> {
        let resp = self
            .http
            .get(self.url("/user"))
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::read(resp).await
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl SessionStore for GoTrueStore {
    async fn get_session(&self) -> Option<Session> {
        let current = self.hub.current()?;
        if !current.expires_within(self.clock.now_secs(), REFRESH_MARGIN_SECS) {
            return Some(current);
        }

        let _refreshing = self.refreshing.lock().await;
        // Someone else may have refreshed while this caller waited.
        let current = self.hub.current()?;
        if !current.expires_within(self.clock.now_secs(), REFRESH_MARGIN_SECS) {
            return Some(current);
        }

        match self.request_refresh(&current.refresh_token).await {
            Ok(fresh) => {
                self.set_current(SessionEventKind::TokenRefreshed, Some(fresh.clone()));
                Some(fresh)
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %current.user_id, "session refresh failed; signing out");
                self.set_current(SessionEventKind::SignedOut, None);
                None
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.url("/token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let tokens: TokenResponse = Self::read(resp).await?;
        let session = tokens.into_session(self.clock.now_secs());
        self.set_current(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, fields: &SignUpFields) -> Result<Option<Session>, AuthError> {
        let resp = self
            .http
            .post(self.url("/signup"))
            .json(&json!({
                "email": fields.email,
                "password": fields.password,
                "data": fields.metadata(),
            }))
            .send()
            .await?;
        let body: Value = Self::read(resp).await?;

        // Without a token the provider is waiting for email confirmation.
        if body.get("access_token").is_none() {
            tracing::info!(email = %fields.email, "sign-up pending confirmation");
            return Ok(None);
        }
        let tokens: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Unknown(format!("unexpected provider response: {e}")))?;
        let session = tokens.into_session(self.clock.now_secs());
        self.set_current(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let result = match self.hub.current() {
            Some(session) => match self
                .http
                .post(self.url("/logout"))
                .bearer_auth(&session.access_token)
                .send()
                .await
            {
                Ok(resp) => Self::expect_success(resp).await,
                Err(e) => Err(e.into()),
            },
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "provider sign-out failed; clearing local session anyway");
        }
        self.set_current(SessionEventKind::SignedOut, None);
        result
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let mut body = json!({ "email": email });
        if let Some(redirect) = &self.recovery_redirect {
            body["redirect_to"] = json!(redirect);
        }
        let resp = self.http.post(self.url("/recover")).json(&body).send().await?;
        Self::expect_success(resp).await
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self
            .get_session()
            .await
            .ok_or_else(|| AuthError::Unknown("no active session".into()))?;
        let resp = self
            .http
            .put(self.url("/user"))
            .bearer_auth(&session.access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        let user: ProviderUser = Self::read(resp).await?;
        let mut updated = session;
        if let Some(email) = user.email {
            updated.email = email;
        }
        updated.metadata = user.user_metadata;
        self.set_current(SessionEventKind::UserUpdated, Some(updated));
        Ok(())
    }
}
