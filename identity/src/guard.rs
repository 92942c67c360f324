//! Route guards: pure render-or-redirect decisions over auth state.
//!
//! Guards hold no state of their own. The client components and the CLI's
//! `status` command feed them a [`GuardInput`] taken from the current
//! [`crate::context::AuthSnapshot`] and act on the returned decision.

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

pub const LOGIN_PATH: &str = "/login";
pub const ONBOARD_PATH: &str = "/onboard";
pub const HOME_PATH: &str = "/";

/// The slice of auth state guards look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardInput {
    pub is_loading: bool,
    pub is_profile_loading: bool,
    pub is_organization_loading: bool,
    pub is_authenticated: bool,
    pub has_profile: bool,
}

impl GuardInput {
    fn any_loading(&self) -> bool {
        self.is_loading || self.is_profile_loading || self.is_organization_loading
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a loading indicator; state is not settled.
    Loading,
    /// Navigate away. `from` is the attempted path, kept for the post-login
    /// redirect.
    Redirect { to: &'static str, from: Option<String> },
    Render,
}

impl GuardDecision {
    fn redirect(to: &'static str) -> Self {
        Self::Redirect { to, from: None }
    }
}

/// Guard for routes that need a signed-in user, routing users without a
/// profile to onboarding and users with one away from it.
#[must_use]
pub fn onboarding_guard(input: &GuardInput, path: &str) -> GuardDecision {
    if input.any_loading() {
        return GuardDecision::Loading;
    }
    if !input.is_authenticated {
        return GuardDecision::redirect(LOGIN_PATH);
    }
    if !input.has_profile {
        if path.starts_with(ONBOARD_PATH) {
            return GuardDecision::Render;
        }
        return GuardDecision::redirect(ONBOARD_PATH);
    }
    if path.starts_with(ONBOARD_PATH) {
        return GuardDecision::redirect(HOME_PATH);
    }
    GuardDecision::Render
}

/// Outer layout guard: only checks authentication, remembering where the
/// user was headed.
#[must_use]
pub fn app_layout_guard(input: &GuardInput, path: &str) -> GuardDecision {
    if input.any_loading() {
        return GuardDecision::Loading;
    }
    if !input.is_authenticated {
        return GuardDecision::Redirect { to: LOGIN_PATH, from: Some(path.to_owned()) };
    }
    GuardDecision::Render
}

/// Where to go after a successful login. Only same-origin absolute paths are
/// honoured, and never the login page itself.
#[must_use]
pub fn post_login_target(from: Option<&str>) -> &str {
    match from {
        Some(p) if p.starts_with('/') && !p.starts_with("//") && !p.starts_with(LOGIN_PATH) => p,
        _ => HOME_PATH,
    }
}
