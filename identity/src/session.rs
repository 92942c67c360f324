//! Identity-provider session model and the session store contract.
//!
//! ARCHITECTURE
//! ============
//! A [`SessionStore`] owns the current [`Session`] and announces every change
//! (sign-in, sign-out, token rotation) on a broadcast channel. Consumers never
//! register callbacks; they hold a receiver and read events in FIFO order.
//!
//! [`SessionHub`] is the shared bookkeeping half of a store: the current value
//! plus the sender, updated under one lock so the stored session and the
//! published event order can never disagree.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::AuthError;

/// Broadcast capacity for session events. Slow consumers that lag past this
/// re-read the current session instead of replaying history.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// SESSION
// =============================================================================

/// Proof of authentication issued by the identity provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as Unix seconds.
    pub expires_at: i64,
    /// Raw user metadata bag. Read it through [`Session::metadata`].
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        now_secs >= self.expires_at
    }

    /// True when the session expires within `margin_secs` of `now_secs`.
    #[must_use]
    pub fn expires_within(&self, now_secs: i64, margin_secs: i64) -> bool {
        now_secs.saturating_add(margin_secs) >= self.expires_at
    }

    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata::from_map(&self.metadata)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Typed view over the session's user metadata, with every field defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub first_name: String,
    pub last_name: String,
    pub organization_id: Option<i64>,
    pub role_id: Option<i64>,
}

impl SessionMetadata {
    #[must_use]
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            first_name: string_field(map, "first_name"),
            last_name: string_field(map, "last_name"),
            organization_id: int_field(map, "organization_id"),
            role_id: int_field(map, "role_id"),
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}

/// Accepts JSON numbers and numeric strings; metadata is written by several
/// clients and not all of them keep ids numeric.
fn int_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// SIGN-UP FIELDS
// =============================================================================

/// Registration payload. Names and invitation data travel as user metadata.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignUpFields {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub organization_id: Option<i64>,
    pub organization_name: Option<String>,
    pub role_id: Option<i64>,
}

impl SignUpFields {
    /// Metadata bag stored on the identity-provider user.
    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("first_name".into(), Value::from(self.first_name.clone()));
        map.insert("last_name".into(), Value::from(self.last_name.clone()));
        if let Some(id) = self.organization_id {
            map.insert("organization_id".into(), Value::from(id));
        }
        if let Some(name) = &self.organization_name {
            map.insert("organization_name".into(), Value::from(name.clone()));
        }
        if let Some(role) = self.role_id {
            map.insert("role_id".into(), Value::from(role));
        }
        map
    }
}

impl fmt::Debug for SignUpFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpFields")
            .field("email", &self.email)
            .field("password", &"***")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("organization_id", &self.organization_id)
            .field("organization_name", &self.organization_name)
            .field("role_id", &self.role_id)
            .finish()
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    /// Session restored from storage when the store starts.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    /// Session established from a password-recovery link.
    PasswordRecovery,
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

/// Current session plus its change feed.
#[derive(Debug)]
pub struct SessionHub {
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { current: RwLock::new(None), events }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Replace the current session and announce it.
    pub fn publish(&self, kind: SessionEventKind, session: Option<Session>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.clone_from(&session);
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(SessionEvent { kind, session });
    }
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// Identity-provider session operations.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SessionStore: Send + Sync {
    /// Current session, refreshed first if it is about to expire.
    async fn get_session(&self) -> Option<Session>;

    /// Change feed. Subscribe before reading the initial session so no
    /// event between the two is missed.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Register a user. `None` when the provider requires email confirmation
    /// before it issues a session.
    async fn sign_up(&self, fields: &SignUpFields) -> Result<Option<Session>, AuthError>;

    /// End the session. Local state is cleared even if the provider call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError>;
}
