//! Auth context: the session-bootstrap state machine.
//!
//! SYSTEM CONTEXT
//! ==============
//! One [`AuthContext`] per running client. It listens to the session store,
//! resolves the profile and organization for each session, and publishes the
//! composed [`AuthSnapshot`] on a `watch` channel that guards and views read.
//!
//! ```text
//! Initializing ─┬─▶ SessionAbsent
//!               └─▶ ProfileLoading ─┬─▶ ProfileAbsent
//!                                   └─▶ ProfileReady ─▶ OrganizationLoading ─▶ OrganizationReady
//! ```
//!
//! DESIGN
//! ======
//! Every resolution is tagged with a generation number. A newer session
//! event bumps the generation and drops the in-flight resolution future;
//! commits re-check the generation under the same lock that bumps it, so a
//! result from an older session can never land on top of a newer one.
//!
//! Token rotations and metadata updates for the signed-in user re-resolve in
//! the background: the current profile stays visible until the new one is
//! committed.
//!
//! Actions never write profile or organization state. They call the store,
//! and the resulting session event drives the machine.

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::OptionFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use crate::backend::{BackendApi, ProfileUpdate};
use crate::clock::Clock;
use crate::error::{AuthError, BackendError};
use crate::guard::GuardInput;
use crate::invite::InviteToken;
use crate::organization::{Organization, OrganizationResolver};
use crate::profile::{self, ProfileResolver, UserProfile};
use crate::session::{Session, SessionEvent, SessionEventKind, SessionStore};
use crate::validation::{self, SignUpForm, ValidationError};

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPhase {
    #[default]
    Initializing,
    SessionAbsent,
    ProfileLoading,
    ProfileReady,
    /// Signed in, but the backend has no profile yet: onboarding.
    ProfileAbsent,
    OrganizationLoading,
    OrganizationReady,
}

impl AuthPhase {
    /// Phases a view can render without a spinner.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::SessionAbsent | Self::ProfileAbsent | Self::OrganizationReady)
    }
}

/// Composed auth state.
///
/// `is_authenticated` is true iff `session` was present and unexpired when
/// the snapshot was committed. `profile` is `None` while the profile loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    pub organization: Option<Organization>,
    pub is_authenticated: bool,
    pub is_submitting: bool,
}

impl AuthSnapshot {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == AuthPhase::Initializing
    }

    #[must_use]
    pub fn is_profile_loading(&self) -> bool {
        self.phase == AuthPhase::ProfileLoading
    }

    #[must_use]
    pub fn is_organization_loading(&self) -> bool {
        self.phase == AuthPhase::OrganizationLoading
    }

    #[must_use]
    pub fn guard_input(&self) -> GuardInput {
        GuardInput {
            is_loading: self.is_loading(),
            is_profile_loading: self.is_profile_loading(),
            is_organization_loading: self.is_organization_loading(),
            is_authenticated: self.is_authenticated,
            has_profile: self.profile.is_some(),
        }
    }

    fn signed_out() -> Self {
        Self { phase: AuthPhase::SessionAbsent, ..Self::default() }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("not signed in")]
    NotSignedIn,
}

/// Result of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn,
    /// The provider wants the address confirmed before issuing a session.
    ConfirmationRequired,
}

// =============================================================================
// CONTEXT
// =============================================================================

/// How a resolution presents itself while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Clear profile state and walk the loading phases.
    Full,
    /// Keep showing the current profile until the new one commits.
    Background,
}

pub struct AuthContext {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn BackendApi>,
    profiles: ProfileResolver,
    organizations: OrganizationResolver,
    clock: Arc<dyn Clock>,
    state: watch::Sender<AuthSnapshot>,
    generation: Mutex<u64>,
    submitting: AtomicUsize,
    #[cfg(not(target_arch = "wasm32"))]
    listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AuthContext {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn BackendApi>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            profiles: ProfileResolver::new(Arc::clone(&backend), Arc::clone(&clock)),
            organizations: OrganizationResolver::new(Arc::clone(&backend)),
            store,
            backend,
            clock,
            state,
            generation: Mutex::new(0),
            submitting: AtomicUsize::new(0),
            #[cfg(not(target_arch = "wasm32"))]
            listener: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Wait until the published state satisfies `pred`.
    pub async fn wait_until(&self, mut pred: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        match rx.wait_for(|s| pred(s)).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Wait for a phase a view can render without a spinner.
    pub async fn wait_until_settled(&self) -> AuthSnapshot {
        self.wait_until(|s| s.phase.is_settled()).await
    }

    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        profile::has_permission(self.state.borrow().profile.as_ref(), name)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start the session listener on the tokio runtime. A second call while
    /// the listener is running does nothing.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn init(self: &Arc<Self>) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let ctx = Arc::clone(self);
        *listener = Some(tokio::spawn(async move { ctx.run().await }));
        tracing::debug!("auth context started");
    }

    /// Stop the listener. Published state is left as it was.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn teardown(&self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            tracing::debug!("auth context stopped");
        }
    }

    /// Session listener loop. Runs until the store's event channel closes;
    /// browser builds drive it with `spawn_local`.
    pub async fn run(&self) {
        // Subscribe before reading so nothing between the two is missed.
        let mut events = self.store.subscribe();
        let initial = self.store.get_session().await;

        let first = self.next_generation();
        let mut resolution = std::pin::pin!(OptionFuture::from(Some(self.resolve(first, initial, Mode::Full))));

        loop {
            tokio::select! {
                event = events.recv() => {
                    let (session, mode) = match event {
                        Ok(event) => {
                            let mode = self.mode_for(&event);
                            (event.session, mode)
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "session events lagged; re-reading session");
                            (self.store.get_session().await, Mode::Full)
                        }
                        Err(RecvError::Closed) => break,
                    };
                    let generation = self.next_generation();
                    // Replacing the future drops the stale resolution.
                    resolution.set(Some(self.resolve(generation, session, mode)).into());
                }
                Some(()) = resolution.as_mut() => {
                    resolution.set(None.into());
                }
            }
        }
        tracing::debug!("session event channel closed");
    }

    fn mode_for(&self, event: &SessionEvent) -> Mode {
        let same_user = event.session.is_some() && self.is_current_user(event.session.as_ref());
        if event.kind == SessionEventKind::SignedOut || !same_user {
            // Cached organizations belong to the user who fetched them.
            self.organizations.clear();
        }
        match event.kind {
            SessionEventKind::TokenRefreshed | SessionEventKind::UserUpdated if same_user => Mode::Background,
            _ => Mode::Full,
        }
    }

    fn is_current_user(&self, session: Option<&Session>) -> bool {
        let current = self.state.borrow();
        current.session.as_ref().map(|s| s.user_id.as_str()) == session.map(|s| s.user_id.as_str())
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    fn next_generation(&self) -> u64 {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        *generation
    }

    /// Apply `update` if `generation` is still current.
    fn commit(&self, generation: u64, update: impl FnOnce(&mut AuthSnapshot)) -> bool {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            tracing::debug!(generation, current = *current, "discarding stale auth state");
            return false;
        }
        self.state.send_modify(update);
        true
    }

    async fn resolve(&self, generation: u64, session: Option<Session>, mode: Mode) {
        let now = self.clock.now_secs();
        let Some(session) = session.filter(|s| !s.is_expired_at(now)) else {
            self.commit(generation, |s| {
                let is_submitting = s.is_submitting;
                *s = AuthSnapshot { is_submitting, ..AuthSnapshot::signed_out() };
            });
            return;
        };

        let committed = self.commit(generation, |s| {
            s.session = Some(session.clone());
            s.is_authenticated = true;
            if mode == Mode::Full {
                s.phase = AuthPhase::ProfileLoading;
                s.profile = None;
                s.organization = None;
            }
        });
        if !committed {
            return;
        }

        let Some(profile) = self.profiles.resolve(Some(&session)).await else {
            self.commit(generation, |s| {
                s.phase = AuthPhase::ProfileAbsent;
                s.profile = None;
                s.organization = None;
            });
            return;
        };

        let Some(organization_id) = profile.organization.id.filter(|id| *id > 0) else {
            self.commit(generation, |s| {
                s.phase = AuthPhase::OrganizationReady;
                s.profile = Some(profile);
                s.organization = None;
            });
            return;
        };

        if mode == Mode::Full {
            let shown = self.commit(generation, |s| {
                s.phase = AuthPhase::ProfileReady;
                s.profile = Some(profile.clone());
            });
            if !shown {
                return;
            }
            self.commit(generation, |s| s.phase = AuthPhase::OrganizationLoading);
        }

        let organization = match self
            .organizations
            .resolve(&session.access_token, Some(organization_id))
            .await
        {
            Some(org) => Some(org),
            // Stale but available beats blank.
            None => self
                .state
                .borrow()
                .organization
                .clone()
                .filter(|o| o.organization_id == organization_id),
        };
        let profile = match &organization {
            Some(org) => profile.with_organization(org),
            None => profile,
        };

        if self.commit(generation, |s| {
            s.phase = AuthPhase::OrganizationReady;
            s.profile = Some(profile);
            s.organization = organization;
        }) {
            tracing::debug!(user_id = %session.user_id, organization_id, "auth state ready");
        }
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    fn begin_submit(&self) -> SubmitGuard<'_> {
        self.state.send_modify(|s| {
            self.submitting.fetch_add(1, Ordering::SeqCst);
            s.is_submitting = true;
        });
        SubmitGuard { ctx: self }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ActionError> {
        let email = validation::validate_sign_in(email, password)?;
        let _submitting = self.begin_submit();
        self.store.sign_in(&email, password).await?;
        tracing::info!(email = %email, "signed in");
        Ok(())
    }

    /// Register from the sign-up form, joining the invited organization when
    /// an invitation is given.
    pub async fn sign_up(&self, form: &SignUpForm, invite: Option<&InviteToken>) -> Result<SignUpOutcome, ActionError> {
        let mut fields = form.validate()?;
        if let Some(invite) = invite {
            fields = invite.apply(fields);
        }
        let _submitting = self.begin_submit();
        match self.store.sign_up(&fields).await? {
            Some(_) => Ok(SignUpOutcome::SignedIn),
            None => {
                tracing::info!(email = %fields.email, "sign-up awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), ActionError> {
        let _submitting = self.begin_submit();
        self.organizations.clear();
        self.store.sign_out().await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ActionError> {
        let email = validation::normalize_email(email)?;
        let _submitting = self.begin_submit();
        self.store.send_password_reset(&email).await?;
        Ok(())
    }

    pub async fn reset_password(&self, password: &str, confirm: &str) -> Result<(), ActionError> {
        validation::validate_new_password(password, confirm)?;
        let _submitting = self.begin_submit();
        self.store.update_password(password).await?;
        Ok(())
    }

    /// Save names on the backend, then re-resolve from the server's copy.
    pub async fn update_profile(&self, first_name: &str, last_name: &str) -> Result<(), ActionError> {
        let (first_name, last_name) = validation::validate_profile_names(first_name, last_name)?;
        let session = self.store.get_session().await.ok_or(ActionError::NotSignedIn)?;
        {
            let _submitting = self.begin_submit();
            self.backend
                .update_profile(&session.access_token, &ProfileUpdate { first_name, last_name })
                .await?;
        }
        self.refresh_profile().await;
        Ok(())
    }

    /// Re-run profile and organization resolution for the current session.
    ///
    /// The generation is taken before the session is read, so a session event
    /// that lands while the read is pending supersedes this refresh.
    pub async fn refresh_profile(&self) {
        let generation = self.next_generation();
        let session = self.store.get_session().await;
        let has_profile = self.state.borrow().profile.is_some();
        let same_user = session.is_some() && has_profile && self.is_current_user(session.as_ref());
        if !same_user {
            self.organizations.clear();
        }
        let mode = if same_user { Mode::Background } else { Mode::Full };
        self.resolve(generation, session, mode).await;
    }
}

/// Holds `is_submitting` up while an action runs.
struct SubmitGuard<'a> {
    ctx: &'a AuthContext,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        let remaining = &self.ctx.submitting;
        self.ctx.state.send_modify(|s| {
            s.is_submitting = remaining.fetch_sub(1, Ordering::SeqCst) > 1;
        });
    }
}
