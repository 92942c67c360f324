//! Error taxonomy shared across the identity provider and backend clients.
//!
//! ERROR HANDLING
//! ==============
//! `AuthError` surfaces to the form that triggered it. `BackendError` is
//! almost always swallowed by the resolvers and degraded to fallback or stale
//! values, so it carries enough context to be logged but nothing more.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use serde::Deserialize;

// =============================================================================
// AUTH ERROR
// =============================================================================

/// Failures reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Email/password pair was rejected.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The provider throttled the request.
    #[error("too many attempts; try again later")]
    RateLimited,

    /// Anything else the provider reported.
    #[error("identity provider error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Stable machine-readable code, used by the UI to pick a translated message.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Network(_) => "E_NETWORK",
            Self::RateLimited => "E_RATE_LIMITED",
            Self::Unknown(_) => "E_AUTH_UNKNOWN",
        }
    }

    /// Map a non-success provider response to an error kind.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        if status == 429 {
            return Self::RateLimited;
        }

        let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed
            .error_code
            .as_deref()
            .or(parsed.error.as_deref())
            .unwrap_or_default();
        if matches!(code, "invalid_credentials" | "invalid_grant") {
            return Self::InvalidCredentials;
        }
        if code == "over_request_rate_limit" || code == "over_email_send_rate_limit" {
            return Self::RateLimited;
        }

        let message = parsed
            .msg
            .or(parsed.error_description)
            .or(parsed.message)
            .unwrap_or_else(|| body.trim().to_owned());
        Self::Unknown(format!("{status}: {message}"))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Unknown(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// BACKEND ERROR
// =============================================================================

/// Failures from the portal REST backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("resource not found")]
    NotFound,

    #[error("not authorized")]
    Unauthorized,

    #[error("backend error: status {status}")]
    Server { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            _ => Self::Server { status, body },
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
