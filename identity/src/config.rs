//! Portal configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATE_FILE: &str = ".portal-state.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Identity provider project URL (without the `/auth/v1` suffix).
    pub identity_url: String,
    /// Public key sent as the `apikey` header on every identity call.
    pub identity_anon_key: String,
    /// Default portal REST API base URL. A debug override may replace it.
    pub backend_url: String,
    pub timeouts: HttpTimeouts,
    /// Where native builds persist session and preference keys.
    pub state_file: PathBuf,
}

impl PortalConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `PORTAL_IDENTITY_URL`
    /// - `PORTAL_IDENTITY_ANON_KEY`
    /// - `PORTAL_BACKEND_URL`
    ///
    /// Optional:
    /// - `PORTAL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PORTAL_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PORTAL_STATE_FILE`: default `.portal-state.json`
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity_url = required_url("PORTAL_IDENTITY_URL")?;
        let identity_anon_key = required("PORTAL_IDENTITY_ANON_KEY")?;
        let backend_url = required_url("PORTAL_BACKEND_URL")?;
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("PORTAL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("PORTAL_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let state_file = std::env::var("PORTAL_STATE_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STATE_FILE), PathBuf::from);

        Ok(Self { identity_url, identity_anon_key, backend_url, timeouts, state_file })
    }

    /// Build config from values baked in at compile time (the browser build
    /// has no process environment). Timeouts and the state file keep their
    /// defaults.
    pub fn from_parts(identity_url: &str, identity_anon_key: &str, backend_url: &str) -> Result<Self, ConfigError> {
        let url = |var: &'static str, value: &str| {
            normalize_base_url(value).ok_or_else(|| ConfigError::Invalid { var, value: value.to_owned() })
        };
        let identity_anon_key = identity_anon_key.trim();
        if identity_anon_key.is_empty() {
            return Err(ConfigError::Missing { var: "PORTAL_IDENTITY_ANON_KEY" });
        }
        Ok(Self {
            identity_url: url("PORTAL_IDENTITY_URL", identity_url)?,
            identity_anon_key: identity_anon_key.to_owned(),
            backend_url: url("PORTAL_BACKEND_URL", backend_url)?,
            timeouts: HttpTimeouts::default(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        })
    }

    /// GoTrue REST root, e.g. `https://project.example.co/auth/v1`.
    #[must_use]
    pub fn identity_auth_url(&self) -> String {
        format!("{}/auth/v1", self.identity_url)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn required_url(var: &'static str) -> Result<String, ConfigError> {
    let value = required(var)?;
    normalize_base_url(&value).ok_or(ConfigError::Invalid { var, value })
}

/// Trim trailing slashes and require an http(s) scheme.
#[must_use]
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))?;
    if rest.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
