//! Organization records and the per-session organization cache.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch yields `None` and is logged. The auth context decides
//! whether a previously known record stays on screen; this module only
//! refuses to cache failures.

#[cfg(test)]
#[path = "organization_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::backend::BackendApi;

/// Tenant category. Scopes which dashboard areas an organization sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Advertiser,
    Affiliate,
    Agency,
    PlatformOwner,
}

impl OrganizationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Advertiser => "advertiser",
            Self::Affiliate => "affiliate",
            Self::Agency => "agency",
            Self::PlatformOwner => "platform_owner",
        }
    }
}

/// Organization as returned by `GET /organizations/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OrganizationType,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Fetches organizations and caches successes by id for the session lifetime.
pub struct OrganizationResolver {
    backend: Arc<dyn BackendApi>,
    cache: Mutex<HashMap<i64, Organization>>,
}

impl OrganizationResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self { backend, cache: Mutex::new(HashMap::new()) }
    }

    /// Resolve an organization. Missing or non-positive ids short-circuit
    /// to `None` without a network call.
    pub async fn resolve(&self, access_token: &str, organization_id: Option<i64>) -> Option<Organization> {
        let id = organization_id.filter(|id| *id > 0)?;
        if let Some(hit) = self.cached(id) {
            return Some(hit);
        }

        match self.backend.fetch_organization(access_token, id).await {
            Ok(org) => {
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, org.clone());
                Some(org)
            }
            Err(e) => {
                tracing::warn!(error = %e, organization_id = id, "organization fetch failed");
                None
            }
        }
    }

    #[must_use]
    pub fn cached(&self, organization_id: i64) -> Option<Organization> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&organization_id)
            .cloned()
    }

    /// Drop every cached record. Called when the session ends or changes user.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
