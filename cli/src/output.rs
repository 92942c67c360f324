//! JSON renderings of auth state for terminal output.

#[cfg(test)]
#[path = "output_test.rs"]
mod tests;

use identity::AuthSnapshot;
use identity::debug::DebugOverride;
use identity::guard::{GuardDecision, app_layout_guard, onboarding_guard};
use serde_json::{Value, json};

pub fn decision_json(decision: &GuardDecision) -> Value {
    match decision {
        GuardDecision::Loading => json!({ "action": "loading" }),
        GuardDecision::Redirect { to, from } => json!({ "action": "redirect", "to": to, "from": from }),
        GuardDecision::Render => json!({ "action": "render" }),
    }
}

/// Snapshot plus what each route guard would do at `path`.
pub fn snapshot_json(snapshot: &AuthSnapshot, path: &str) -> Value {
    let input = snapshot.guard_input();
    let session = snapshot.session.as_ref();
    json!({
        "phase": format!("{:?}", snapshot.phase),
        "authenticated": snapshot.is_authenticated,
        "email": session.map(|s| s.email.as_str()),
        "user_id": session.map(|s| s.user_id.as_str()),
        "expires_at": session.map(|s| s.expires_at),
        "profile": snapshot.profile.as_ref().map(|p| json!({
            "name": p.display_name(),
            "role": p.role.name,
            "organization_id": p.organization.id,
            "organization_name": p.organization.name,
        })),
        "organization": snapshot.organization.as_ref().map(|o| json!({
            "id": o.organization_id,
            "name": o.name,
            "type": o.kind.as_str(),
            "status": o.status,
        })),
        "guards": {
            "path": path,
            "app_layout": decision_json(&app_layout_guard(&input, path)),
            "onboarding": decision_json(&onboarding_guard(&input, path)),
        },
    })
}

pub fn debug_json(state: &DebugOverride) -> Value {
    json!({
        "enabled": state.enabled,
        "backend_url": state.backend_url,
        "active_backend_url": state.active_backend_url(),
        "awaiting_url": state.awaiting_url(),
    })
}
