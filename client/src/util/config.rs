//! Portal configuration baked into the browser bundle.
//!
//! SYSTEM CONTEXT
//! ==============
//! A WASM bundle has no process environment, so the `PORTAL_*` variables are
//! read with `option_env!` when the bundle is compiled. Unset URLs fall back
//! to the local development stack; the anon key has no default.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use identity::config::{ConfigError, PortalConfig};

pub const DEFAULT_IDENTITY_URL: &str = "http://localhost:54321";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const RESET_PASSWORD_PATH: &str = "/reset-password";

/// Build the portal config from compile-time environment.
pub fn load() -> Result<PortalConfig, ConfigError> {
    PortalConfig::from_parts(
        option_env!("PORTAL_IDENTITY_URL").unwrap_or(DEFAULT_IDENTITY_URL),
        option_env!("PORTAL_IDENTITY_ANON_KEY").unwrap_or_default(),
        option_env!("PORTAL_BACKEND_URL").unwrap_or(DEFAULT_BACKEND_URL),
    )
}

/// Absolute URL of the reset page, sent with password recovery requests so
/// the emailed link lands back in this app.
pub fn recovery_redirect_url(origin: &str) -> String {
    format!("{}{RESET_PASSWORD_PATH}", origin.trim_end_matches('/'))
}
