//! Auth-session state for the current browser user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and pages read [`AuthState::snapshot`], a signal mirroring
//! the `identity` auth context. Actions go through [`AuthServices`], which
//! only exist in the hydrated browser build; server renders stay on the
//! loading phase until hydration takes over.
//!
//! DESIGN
//! ======
//! Pages never write auth state. An action calls the auth context, the
//! identity provider emits a session event, and the resulting snapshot flows
//! back through the watch channel into the signal.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::future::Future;
use std::sync::Arc;

use identity::backend::HttpBackend;
use identity::clock::Clock;
use identity::config::PortalConfig;
use identity::debug::{DebugError, DebugOverride, DebugOverrideStore};
use identity::storage::{KeyValueStore, Preferences};
use identity::{ActionError, AuthContext, AuthError, AuthSnapshot, BackendError, GoTrueStore};
use leptos::prelude::*;

/// Shown when an action runs before (or without) the browser services.
pub const UNAVAILABLE_MESSAGE: &str = "Sign-in is unavailable right now. Reload the page and try again.";

/// Collaborators built once per page load.
#[derive(Clone)]
pub struct AuthServices {
    pub ctx: Arc<AuthContext>,
    pub gotrue: Arc<GoTrueStore>,
    pub debug: DebugOverrideStore,
    pub prefs: Preferences,
}

/// Wire the identity stack over the given storage and clock.
pub fn build_services(
    config: &PortalConfig,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    recovery_redirect: String,
) -> Result<AuthServices, String> {
    let debug = DebugOverrideStore::new(storage.clone());
    let gotrue = Arc::new(
        GoTrueStore::new(config, storage.clone(), clock.clone())
            .map_err(|e| e.to_string())?
            .with_recovery_redirect(recovery_redirect),
    );
    let backend = Arc::new(
        HttpBackend::new(config)
            .map_err(|e| e.to_string())?
            .with_debug_override(debug.clone()),
    );
    let ctx = Arc::new(AuthContext::new(gotrue.clone(), backend, clock));
    Ok(AuthServices { ctx, gotrue, debug, prefs: Preferences::new(storage) })
}

/// Context handle. Copy it into closures freely; every field is an arena
/// handle.
#[derive(Clone, Copy)]
pub struct AuthState {
    pub snapshot: RwSignal<AuthSnapshot>,
    /// Mirror of the persisted debug override.
    pub debug: RwSignal<DebugOverride>,
    /// Set when the browser services could not be built.
    pub startup_error: RwSignal<Option<String>>,
    services: StoredValue<Option<AuthServices>, LocalStorage>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            snapshot: RwSignal::new(AuthSnapshot::default()),
            debug: RwSignal::new(DebugOverride::default()),
            startup_error: RwSignal::new(None),
            services: StoredValue::new_local(None),
        }
    }

    /// Create the state, provide it as context, and (in the browser) start
    /// the auth listener.
    pub fn provide() -> Self {
        let state = Self::new();
        provide_context(state);
        #[cfg(feature = "hydrate")]
        state.start();
        state
    }

    pub fn services(&self) -> Option<AuthServices> {
        self.services.get_value()
    }

    /// Run an auth action on the local executor. Failures land in `info` as
    /// display text; success handling belongs to `action`.
    pub fn spawn_action<F, Fut>(self, info: RwSignal<String>, action: F)
    where
        F: FnOnce(AuthServices) -> Fut + 'static,
        Fut: Future<Output = Result<(), ActionError>> + 'static,
    {
        let Some(services) = self.services() else {
            info.set(self.startup_error.get_untracked().unwrap_or_else(|| UNAVAILABLE_MESSAGE.to_owned()));
            return;
        };
        #[cfg(feature = "hydrate")]
        leptos::task::spawn_local(async move {
            if let Err(e) = action(services).await {
                log::warn!("auth action failed: {e}");
                info.set(describe(&e));
            }
        });
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (services, action);
        }
    }

    // =========================================================================
    // DEBUG OVERRIDE
    // =========================================================================

    pub fn enable_debug(&self) -> Result<(), String> {
        self.with_debug(DebugOverrideStore::enable)
    }

    pub fn disable_debug(&self) -> Result<(), String> {
        self.with_debug(DebugOverrideStore::disable)
    }

    /// Store a backend URL, returning the normalized form.
    pub fn set_debug_url(&self, raw: &str) -> Result<String, String> {
        let mut stored = String::new();
        self.with_debug(|d| {
            stored = d.set_backend_url(raw)?;
            Ok(())
        })?;
        Ok(stored)
    }

    pub fn reset_debug_url(&self) -> Result<(), String> {
        self.with_debug(DebugOverrideStore::reset_backend_url)
    }

    /// Timer callback: switch debug mode off if it is still waiting for a URL.
    pub fn expire_debug(&self) {
        let result = self.with_debug(|d| if d.load().awaiting_url() { d.disable() } else { Ok(()) });
        if let Err(e) = result {
            #[cfg(feature = "hydrate")]
            log::warn!("debug auto-disable failed: {e}");
            #[cfg(not(feature = "hydrate"))]
            let _ = e;
        }
    }

    fn with_debug(&self, op: impl FnOnce(&DebugOverrideStore) -> Result<(), DebugError>) -> Result<(), String> {
        let services = self.services().ok_or_else(|| UNAVAILABLE_MESSAGE.to_owned())?;
        let result = op(&services.debug).map_err(|e| sentence(&e.to_string()));
        self.debug.set(services.debug.load());
        result
    }

    #[cfg(feature = "hydrate")]
    fn start(self) {
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();
        let services = crate::util::config::load()
            .map_err(|e| e.to_string())
            .and_then(|config| {
                build_services(
                    &config,
                    Arc::new(crate::util::local_storage::BrowserStorage),
                    Arc::new(crate::util::clock::BrowserClock),
                    crate::util::config::recovery_redirect_url(&origin),
                )
            });

        let services = match services {
            Ok(services) => services,
            Err(e) => {
                log::error!("auth startup failed: {e}");
                self.startup_error.set(Some(e));
                self.snapshot.set(AuthSnapshot { phase: identity::AuthPhase::SessionAbsent, ..AuthSnapshot::default() });
                return;
            }
        };
        self.debug.set(services.debug.load());
        self.services.set_value(Some(services.clone()));

        // Mirror committed snapshots into the signal.
        let mut rx = services.ctx.subscribe();
        let snapshot = self.snapshot;
        leptos::task::spawn_local(async move {
            loop {
                let next = rx.borrow_and_update().clone();
                snapshot.set(next);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let listener = services.clone();
        leptos::task::spawn_local(async move {
            if listener.gotrue.restore().await.is_none() {
                log::debug!("no stored session to restore");
            }
            listener.ctx.run().await;
        });

        // Keep the access token fresh while the tab stays open; get_session
        // refreshes once the token is inside the expiry margin.
        leptos::task::spawn_local(async move {
            use identity::SessionStore;
            loop {
                gloo_timers::future::sleep(std::time::Duration::from_secs(REFRESH_POLL_SECS)).await;
                if services.gotrue.get_session().await.is_none() {
                    log::debug!("refresh poll: no active session");
                }
            }
        });
    }
}

#[cfg(feature = "hydrate")]
const REFRESH_POLL_SECS: u64 = 30;

/// Display text for a failed action.
pub fn describe(err: &ActionError) -> String {
    match err {
        ActionError::Validation(e) => sentence(&e.to_string()),
        ActionError::Auth(AuthError::InvalidCredentials) => "Invalid email or password.".to_owned(),
        ActionError::Auth(AuthError::RateLimited) => "Too many attempts. Try again later.".to_owned(),
        ActionError::Auth(AuthError::Network(_)) | ActionError::Backend(BackendError::Network(_)) => {
            "Could not reach the server. Check your connection and try again.".to_owned()
        }
        ActionError::Auth(AuthError::Unknown(msg)) => format!("Sign-in service error: {msg}."),
        ActionError::Backend(BackendError::Unauthorized) | ActionError::NotSignedIn => {
            "Your session has ended. Sign in again.".to_owned()
        }
        ActionError::Backend(e) => format!("Portal service error: {e}."),
    }
}

/// Capitalize the first letter and end with a period.
fn sentence(raw: &str) -> String {
    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().chain(chars).collect();
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}
