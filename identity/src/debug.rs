//! Developer backend override.
//!
//! A hidden gesture (five clicks on the signed-in email) enables debug mode,
//! after which a developer can point every backend call at another base URL.
//! The state lives in the key-value store, independent of the session.
//!
//! TRADE-OFFS
//! ==========
//! This is a convenience, not a security boundary. Anyone with access to the
//! device's storage can set it, which is acceptable because the override only
//! changes where the user's own token is sent.
//!
//! Debug mode left enabled without a URL switches itself off after
//! [`EMPTY_URL_TTL`]. The timer lives only as long as the view that mounted
//! it ([`ExpiryTimer`] natively, a browser timeout in the client).

#[cfg(test)]
#[path = "debug_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use crate::config::normalize_base_url;
use crate::storage::{KeyValueStore, StorageError, keys};

pub const ACTIVATION_CLICKS: u32 = 5;
pub const ACTIVATION_WINDOW: Duration = Duration::from_secs(3);
pub const EMPTY_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("backend URL must start with http:// or https://")]
    InvalidUrl,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Persisted override state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugOverride {
    pub enabled: bool,
    pub backend_url: Option<String>,
}

impl DebugOverride {
    /// URL backend calls should use, if the override is in effect.
    #[must_use]
    pub fn active_backend_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.backend_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Enabled but still waiting for a URL; the state the expiry timer watches.
    #[must_use]
    pub fn awaiting_url(&self) -> bool {
        self.enabled && self.active_backend_url().is_none()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Reads and writes the override keys. Every mutation is persisted before
/// the call returns.
#[derive(Clone)]
pub struct DebugOverrideStore {
    storage: Arc<dyn KeyValueStore>,
}

impl DebugOverrideStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn load(&self) -> DebugOverride {
        let enabled = self.storage.get(keys::DEBUG_MODE).as_deref() == Some("true");
        let backend_url = self
            .storage
            .get(keys::DEBUG_BACKEND_URL)
            .filter(|u| !u.trim().is_empty());
        DebugOverride { enabled, backend_url }
    }

    #[must_use]
    pub fn active_backend_url(&self) -> Option<String> {
        self.load().active_backend_url().map(str::to_owned)
    }

    pub fn enable(&self) -> Result<(), DebugError> {
        self.storage.set(keys::DEBUG_MODE, "true")?;
        tracing::info!("debug mode enabled");
        Ok(())
    }

    /// Turn debug mode off. The stored URL is kept for the next activation.
    pub fn disable(&self) -> Result<(), DebugError> {
        self.storage.set(keys::DEBUG_MODE, "false")?;
        tracing::info!("debug mode disabled");
        Ok(())
    }

    pub fn set_backend_url(&self, raw: &str) -> Result<String, DebugError> {
        let url = normalize_base_url(raw).ok_or(DebugError::InvalidUrl)?;
        self.storage.set(keys::DEBUG_BACKEND_URL, &url)?;
        tracing::info!(backend_url = %url, "debug backend override set");
        Ok(url)
    }

    pub fn reset_backend_url(&self) -> Result<(), DebugError> {
        self.storage.remove(keys::DEBUG_BACKEND_URL)?;
        tracing::info!("debug backend override cleared");
        Ok(())
    }
}

// =============================================================================
// ACTIVATION GESTURE
// =============================================================================

/// Counts clicks toward the activation gesture.
///
/// A window opens at the first click of a sequence. Reaching
/// [`ACTIVATION_CLICKS`] before it lapses activates; a lapsed window or an
/// activation resets the count to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickActivator {
    count: u32,
    window_started_ms: Option<i64>,
}

impl ClickActivator {
    /// Record a click. Returns `true` on the click that completes the gesture.
    pub fn register(&mut self, now_ms: i64) -> bool {
        self.expire(now_ms);
        if self.window_started_ms.is_none() {
            self.window_started_ms = Some(now_ms);
        }
        self.count += 1;
        if self.count >= ACTIVATION_CLICKS {
            *self = Self::default();
            return true;
        }
        false
    }

    /// Reset if the window that opened at the first click has lapsed.
    pub fn expire(&mut self, now_ms: i64) {
        if let Some(started) = self.window_started_ms {
            if now_ms.saturating_sub(started) >= window_ms() {
                *self = Self::default();
            }
        }
    }

    /// Clicks still counting toward the gesture at `now_ms`. Zero once the
    /// window has lapsed, whether or not another click arrived.
    #[must_use]
    pub fn count(&self, now_ms: i64) -> u32 {
        match self.window_started_ms {
            Some(started) if now_ms.saturating_sub(started) < window_ms() => self.count,
            _ => 0,
        }
    }

    /// Time left before a partial sequence resets, or `None` when no
    /// sequence is in progress.
    #[must_use]
    pub fn resets_in(&self, now_ms: i64) -> Option<Duration> {
        let started = self.window_started_ms?;
        let left = window_ms().saturating_sub(now_ms.saturating_sub(started));
        Some(Duration::from_millis(u64::try_from(left).unwrap_or(0)))
    }
}

fn window_ms() -> i64 {
    i64::try_from(ACTIVATION_WINDOW.as_millis()).unwrap_or(i64::MAX)
}

// =============================================================================
// EXPIRY
// =============================================================================

/// Tracks continuous residence in the "enabled, no URL" state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugExpiry {
    armed_at_ms: Option<i64>,
}

impl DebugExpiry {
    /// Re-evaluate against `state`. Returns how long until the override
    /// should be disabled, or `None` when no timer should run.
    pub fn observe(&mut self, state: &DebugOverride, now_ms: i64) -> Option<Duration> {
        if !state.awaiting_url() {
            self.armed_at_ms = None;
            return None;
        }
        let armed = *self.armed_at_ms.get_or_insert(now_ms);
        let elapsed = u64::try_from(now_ms.saturating_sub(armed)).unwrap_or(0);
        Some(EMPTY_URL_TTL.saturating_sub(Duration::from_millis(elapsed)))
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed_at_ms.is_some()
    }
}

/// Native expiry timer scoped to the lifetime of its owner. Dropping it
/// cancels the pending disable.
#[cfg(not(target_arch = "wasm32"))]
pub struct ExpiryTimer {
    store: DebugOverrideStore,
    expiry: DebugExpiry,
    origin: tokio::time::Instant,
    pending: Option<tokio::task::JoinHandle<()>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl ExpiryTimer {
    /// Start watching `store`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn mount(store: DebugOverrideStore) -> Self {
        let mut timer = Self { store, expiry: DebugExpiry::default(), origin: tokio::time::Instant::now(), pending: None };
        timer.sync();
        timer
    }

    /// Re-arm or cancel after the override changed.
    pub fn sync(&mut self) {
        // A fired (or never started) timer starts a fresh residence period.
        if !self.is_pending() {
            self.expiry = DebugExpiry::default();
        }
        let now_ms = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        let state = self.store.load();

        match self.expiry.observe(&state, now_ms) {
            Some(_) if self.is_pending() => {}
            Some(delay) => {
                let store = self.store.clone();
                self.cancel();
                self.pending = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if store.load().awaiting_url() {
                        if let Err(e) = store.disable() {
                            tracing::warn!(error = %e, "failed to auto-disable debug mode");
                        } else {
                            tracing::info!("debug mode expired without a backend URL");
                        }
                    }
                }));
            }
            None => self.cancel(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
