//! Dashboard landing page for a fully resolved user.

#[cfg(test)]
#[path = "home_test.rs"]
mod home_test;

use identity::organization::Organization;
use identity::profile::UserProfile;
use leptos::prelude::*;

use crate::components::debug_email_label::DebugEmailLabel;
use crate::state::auth::AuthState;

/// Greeting line; falls back to a generic one for the metadata-only profile.
pub fn greeting(profile: Option<&UserProfile>) -> String {
    match profile.map(UserProfile::display_name).filter(|n| !n.is_empty()) {
        Some(name) => format!("Welcome back, {name}"),
        None => "Welcome back".to_owned(),
    }
}

/// "Name (type)" for the header, or a placeholder when the organization did
/// not resolve.
pub fn organization_label(profile: Option<&UserProfile>, organization: Option<&Organization>) -> String {
    if let Some(org) = organization {
        return format!("{} ({})", org.name, org.kind.as_str().replace('_', " "));
    }
    match profile {
        Some(p) if !p.organization.name.is_empty() => p.organization.name.clone(),
        Some(p) if p.organization.id.is_some() => "Organization unavailable".to_owned(),
        _ => "No organization".to_owned(),
    }
}

#[component]
pub fn HomePage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let info = RwSignal::new(String::new());

    let email = Signal::derive(move || auth.snapshot.with(|s| s.session.as_ref().map(|s| s.email.clone()).unwrap_or_default()));
    let heading = move || auth.snapshot.with(|s| greeting(s.profile.as_ref()));
    let org = move || auth.snapshot.with(|s| organization_label(s.profile.as_ref(), s.organization.as_ref()));
    let role = move || auth.snapshot.with(|s| s.profile.as_ref().map(|p| p.role.name.clone()).unwrap_or_default());

    let on_sign_out = move |_| {
        if auth.snapshot.get_untracked().is_submitting {
            return;
        }
        auth.spawn_action(info, |services| async move { services.ctx.sign_out().await });
    };

    view! {
        <div class="home-page">
            <header class="home-header">
                <div class="home-header__identity">
                    <h1>{heading}</h1>
                    <p class="home-header__org">{org}</p>
                    <p class="home-header__role">{role}</p>
                </div>
                <div class="home-header__account">
                    <DebugEmailLabel email=email/>
                    <button
                        class="login-button"
                        type="button"
                        on:click=on_sign_out
                        disabled=move || auth.snapshot.with(|s| s.is_submitting)
                    >
                        "Sign out"
                    </button>
                </div>
            </header>
            <Show when=move || !info.get().is_empty()>
                <p class="login-message">{move || info.get()}</p>
            </Show>
        </div>
    }
}
