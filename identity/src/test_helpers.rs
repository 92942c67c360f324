//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};

use crate::backend::{BackendApi, BackendProfile, ProfileUpdate};
use crate::clock::Clock;
use crate::context::{AuthContext, AuthSnapshot};
use crate::error::{AuthError, BackendError};
use crate::organization::{Organization, OrganizationType};
use crate::session::{Session, SessionEvent, SessionEventKind, SessionHub, SessionStore, SignUpFields};

/// 2023-11-14T22:13:20Z.
pub(crate) const NOW_MS: i64 = 1_700_000_000_000;
pub(crate) const NOW_SECS: i64 = NOW_MS / 1000;

// =============================================================================
// CLOCK
// =============================================================================

#[derive(Debug)]
pub(crate) struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self { now_ms: AtomicI64::new(NOW_MS) })
    }

    pub(crate) fn advance_secs(&self, secs: i64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub(crate) fn sample_session(user_id: &str, access_token: &str) -> Session {
    let metadata = serde_json::json!({ "first_name": "Jane", "last_name": "Doe" });
    Session {
        user_id: user_id.to_owned(),
        email: format!("{user_id}@example.com"),
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}-refresh"),
        expires_at: NOW_SECS + 3600,
        metadata: metadata.as_object().cloned().unwrap_or_default(),
    }
}

pub(crate) fn sample_profile(first_name: &str, organization_id: Option<i64>) -> BackendProfile {
    BackendProfile {
        first_name: Some(first_name.to_owned()),
        last_name: Some("Doe".to_owned()),
        role_id: None,
        role_name: Some("Advertiser Admin".to_owned()),
        organization_id,
    }
}

pub(crate) fn sample_org(organization_id: i64, name: &str) -> Organization {
    Organization {
        organization_id,
        name: name.to_owned(),
        kind: OrganizationType::Advertiser,
        status: "active".to_owned(),
        created_at: Some("2024-01-01T00:00:00Z".to_owned()),
    }
}

// =============================================================================
// FAKE BACKEND
// =============================================================================

/// In-memory backend keyed by access token. Unknown tokens fail with a
/// network error so the fallback path is the default.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub(crate) profiles: Mutex<HashMap<String, Result<Option<BackendProfile>, BackendError>>>,
    pub(crate) organizations: Mutex<HashMap<i64, Result<Organization, BackendError>>>,
    /// Profile fetches for these tokens block until notified.
    pub(crate) gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub(crate) profile_calls: AtomicUsize,
    pub(crate) organization_calls: AtomicUsize,
    pub(crate) updates: Mutex<Vec<ProfileUpdate>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_profile(&self, token: &str, result: Result<Option<BackendProfile>, BackendError>) {
        self.profiles.lock().unwrap().insert(token.to_owned(), result);
    }

    pub(crate) fn set_organization(&self, id: i64, result: Result<Organization, BackendError>) {
        self.organizations.lock().unwrap().insert(id, result);
    }

    pub(crate) fn gate(&self, token: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(token.to_owned(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn organization_calls(&self) -> usize {
        self.organization_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BackendApi for FakeBackend {
    async fn fetch_profile(&self, access_token: &str) -> Result<Option<BackendProfile>, BackendError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(access_token).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.profiles
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::Network("connection refused".into())))
    }

    async fn update_profile(&self, access_token: &str, update: &ProfileUpdate) -> Result<(), BackendError> {
        self.updates.lock().unwrap().push(update.clone());
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(Ok(Some(profile))) = profiles.get_mut(access_token) {
            profile.first_name = Some(update.first_name.clone());
            profile.last_name = Some(update.last_name.clone());
            Ok(())
        } else {
            Err(BackendError::NotFound)
        }
    }

    async fn fetch_organization(&self, _access_token: &str, organization_id: i64) -> Result<Organization, BackendError> {
        self.organization_calls.fetch_add(1, Ordering::SeqCst);
        self.organizations
            .lock()
            .unwrap()
            .get(&organization_id)
            .cloned()
            .unwrap_or(Err(BackendError::NotFound))
    }
}

// =============================================================================
// FAKE SESSION STORE
// =============================================================================

#[derive(Default)]
pub(crate) struct FakeSessionStore {
    pub(crate) hub: SessionHub,
    /// Result returned by the next `sign_in`. Defaults to invalid credentials.
    pub(crate) sign_in_result: Mutex<Option<Result<Session, AuthError>>>,
    /// When set, `sign_in` blocks until notified.
    pub(crate) sign_in_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) sign_in_calls: AtomicUsize,
    /// When set, the next `get_session` reads the session, then blocks until
    /// notified before returning it.
    pub(crate) get_session_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) sign_ups: Mutex<Vec<SignUpFields>>,
    pub(crate) reset_emails: Mutex<Vec<String>>,
    pub(crate) passwords: Mutex<Vec<String>>,
}

impl FakeSessionStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_session(session: Session) -> Arc<Self> {
        let store = Self::new();
        store.hub.publish(SessionEventKind::InitialSession, Some(session));
        store
    }

    pub(crate) fn emit(&self, kind: SessionEventKind, session: Option<Session>) {
        self.hub.publish(kind, session);
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionStore for FakeSessionStore {
    async fn get_session(&self) -> Option<Session> {
        let session = self.hub.current();
        let gate = self.get_session_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        session
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.subscribe()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.sign_in_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let result = self
            .sign_in_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(AuthError::InvalidCredentials));
        if let Ok(session) = &result {
            self.hub.publish(SessionEventKind::SignedIn, Some(session.clone()));
        }
        result
    }

    async fn sign_up(&self, fields: &SignUpFields) -> Result<Option<Session>, AuthError> {
        self.sign_ups.lock().unwrap().push(fields.clone());
        let mut session = sample_session("new-user", "signup-token");
        session.email.clone_from(&fields.email);
        session.metadata = fields.metadata();
        self.hub.publish(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.hub.publish(SessionEventKind::SignedOut, None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.reset_emails.lock().unwrap().push(email.to_owned());
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        self.passwords.lock().unwrap().push(new_password.to_owned());
        Ok(())
    }
}

// =============================================================================
// CONTEXT HELPERS
// =============================================================================

/// Wait (bounded) until the published snapshot satisfies `pred`.
pub(crate) async fn wait_for(ctx: &AuthContext, pred: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
    tokio::time::timeout(Duration::from_secs(5), ctx.wait_until(pred))
        .await
        .expect("timed out waiting for auth state")
}
