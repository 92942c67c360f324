//! Domain-level user profile and its resolver.
//!
//! DESIGN
//! ======
//! `UserProfile` is derived, never persisted: it is rebuilt from the backend
//! profile, merged with the organization record when one resolves.
//!
//! ERROR HANDLING
//! ==============
//! Backend failures do not propagate. A valid session always yields a
//! profile: either the backend's, or a fallback synthesized from session
//! metadata with the default role and no organization. Only a missing or
//! expired session yields `None`, and so does a backend that explicitly
//! reports "no profile yet" (the onboarding case).

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendApi, BackendProfile};
use crate::clock::Clock;
use crate::organization::Organization;
use crate::session::Session;

/// Role label used when the backend does not say otherwise.
pub const DEFAULT_ROLE: &str = "User";

/// Roles that pass every permission check.
const SUPERUSER_ROLES: &[&str] = &["admin", "platform owner", "platform_owner"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

impl Default for Role {
    fn default() -> Self {
        Self { name: DEFAULT_ROLE.to_owned() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRef {
    /// Present iff the backend profile carried an organization id.
    pub id: Option<i64>,
    /// Empty until the organization resolves.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub organization: OrganizationRef,
}

impl UserProfile {
    #[must_use]
    pub fn from_backend(raw: &BackendProfile) -> Self {
        let role_name = raw
            .role_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .or_else(|| raw.role_id.map(|id| id.to_string()))
            .unwrap_or_else(|| DEFAULT_ROLE.to_owned());

        Self {
            first_name: raw.first_name.clone().unwrap_or_default(),
            last_name: raw.last_name.clone().unwrap_or_default(),
            role: Role { name: role_name },
            organization: OrganizationRef { id: raw.organization_id, name: String::new() },
        }
    }

    /// Degraded profile built from session metadata alone.
    #[must_use]
    pub fn fallback(session: &Session) -> Self {
        let meta = session.metadata();
        Self {
            first_name: meta.first_name,
            last_name: meta.last_name,
            role: Role::default(),
            organization: OrganizationRef::default(),
        }
    }

    /// Copy the organization's name in when the ids agree.
    #[must_use]
    pub fn with_organization(mut self, org: &Organization) -> Self {
        if self.organization.id == Some(org.organization_id) {
            self.organization.name.clone_from(&org.name);
        }
        self
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        let role = self.role.name.trim().to_ascii_lowercase();
        SUPERUSER_ROLES.contains(&role.as_str()) || role == name.trim().to_ascii_lowercase()
    }
}

/// Permission check over an optional profile; no profile, no permissions.
#[must_use]
pub fn has_permission(profile: Option<&UserProfile>, name: &str) -> bool {
    profile.is_some_and(|p| p.has_permission(name))
}

// =============================================================================
// RESOLVER
// =============================================================================

pub struct ProfileResolver {
    backend: Arc<dyn BackendApi>,
    clock: Arc<dyn Clock>,
}

impl ProfileResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn BackendApi>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    pub async fn resolve(&self, session: Option<&Session>) -> Option<UserProfile> {
        let session = session.filter(|s| !s.is_expired_at(self.clock.now_secs()))?;

        match self.backend.fetch_profile(&session.access_token).await {
            Ok(Some(raw)) => Some(UserProfile::from_backend(&raw)),
            Ok(None) => {
                tracing::info!(user_id = %session.user_id, "no portal profile yet");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %session.user_id, "profile fetch failed; using session metadata");
                Some(UserProfile::fallback(session))
            }
        }
    }
}
