//! First-run profile setup.
//!
//! Shown to signed-in users the backend has no profile for. Saving writes
//! the names, then the auth context re-fetches the profile; once it exists
//! the onboarding guard moves the user on to the dashboard.

#[cfg(test)]
#[path = "onboard_test.rs"]
mod onboard_test;

use identity::AuthSnapshot;
use leptos::prelude::*;
use leptos_router::hooks::use_params_map;

use crate::state::auth::AuthState;

/// Heading for `/onboard/:kind`; unknown or missing kinds get the generic one.
fn onboarding_heading(kind: Option<&str>) -> &'static str {
    match kind {
        Some("advertiser") => "Set up your advertiser account",
        Some("affiliate") => "Set up your affiliate account",
        Some("agency") => "Set up your agency account",
        _ => "Welcome to the Partner Portal",
    }
}

/// Name fields prefilled from sign-up metadata, when the provider kept it.
fn metadata_names(snapshot: &AuthSnapshot) -> (String, String) {
    snapshot.session.as_ref().map_or_else(Default::default, |s| {
        let meta = s.metadata();
        (meta.first_name, meta.last_name)
    })
}

#[component]
pub fn OnboardPage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let params = use_params_map();
    let heading = move || params.with(|p| onboarding_heading(p.get("kind").as_deref()));
    let (first, last) = metadata_names(&auth.snapshot.get_untracked());
    let first_name = RwSignal::new(first);
    let last_name = RwSignal::new(last);
    let info = RwSignal::new(String::new());

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.snapshot.get_untracked().is_submitting {
            return;
        }
        let first_value = first_name.get_untracked();
        let last_value = last_name.get_untracked();
        info.set(String::new());
        auth.spawn_action(info, move |services| async move {
            services.ctx.update_profile(&first_value, &last_value).await
        });
    };

    let email = move || auth.snapshot.with(|s| s.session.as_ref().map(|s| s.email.clone()).unwrap_or_default());
    let on_sign_out = move |_| auth.spawn_action(info, |services| async move { services.ctx.sign_out().await });

    view! {
        <div class="login-page">
            <div class="login-card">
                <h1>{heading}</h1>
                <p class="login-card__subtitle">"Tell us your name to finish setting up the account for " {email} "."</p>
                <form class="login-form" on:submit=on_submit>
                    <input
                        class="login-input"
                        type="text"
                        autocomplete="given-name"
                        placeholder="First name"
                        prop:value=move || first_name.get()
                        on:input=move |ev| first_name.set(event_target_value(&ev))
                    />
                    <input
                        class="login-input"
                        type="text"
                        autocomplete="family-name"
                        placeholder="Last name"
                        prop:value=move || last_name.get()
                        on:input=move |ev| last_name.set(event_target_value(&ev))
                    />
                    <button
                        class="login-button"
                        type="submit"
                        disabled=move || auth.snapshot.with(|s| s.is_submitting)
                    >
                        "Continue"
                    </button>
                </form>
                <Show when=move || !info.get().is_empty()>
                    <p class="login-message">{move || info.get()}</p>
                </Show>
                <div class="login-links">
                    <button class="login-link-button" type="button" on:click=on_sign_out>"Sign out"</button>
                </div>
            </div>
        </div>
    }
}
