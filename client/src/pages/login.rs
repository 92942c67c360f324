//! Email + password login page.
//!
//! SYSTEM CONTEXT
//! ==============
//! Guards send signed-out users here with `?from=<path>`. Once the auth
//! snapshot reports a signed-in user the page navigates to that path, where
//! the guards hold a loading indicator until the profile and organization
//! have resolved.

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;

use identity::guard::post_login_target;
use leptos::prelude::*;
use leptos_router::NavigateOptions;
use leptos_router::hooks::{use_navigate, use_query_map};

use crate::state::auth::AuthState;

/// Where to go once signed in, from the raw `from` query value.
pub fn login_destination(from: Option<&str>) -> String {
    post_login_target(from).to_owned()
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let query = use_query_map();
    let navigate = use_navigate();

    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let remember = RwSignal::new(false);
    let info = RwSignal::new(String::new());

    // Prefill the remembered address once.
    Effect::new(move || {
        if let Some(saved) = auth.services().and_then(|s| s.prefs.remembered_email()) {
            email.set(saved);
            remember.set(true);
        }
    });

    Effect::new(move || {
        let snapshot = auth.snapshot.get();
        if snapshot.is_authenticated && !snapshot.is_loading() {
            let from = query.with(|q| q.get("from"));
            navigate(&login_destination(from.as_deref()), NavigateOptions { replace: true, ..NavigateOptions::default() });
        }
    });

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.snapshot.get_untracked().is_submitting {
            return;
        }
        let email_value = email.get_untracked();
        let password_value = password.get_untracked();
        let remember_value = remember.get_untracked();
        info.set(String::new());
        auth.spawn_action(info, move |services| async move {
            services.ctx.sign_in(&email_value, &password_value).await?;
            if let Err(e) = services.prefs.set_remembered_email(email_value.trim(), remember_value) {
                #[cfg(feature = "hydrate")]
                log::warn!("could not persist remembered email: {e}");
                #[cfg(not(feature = "hydrate"))]
                let _ = e;
            }
            Ok(())
        });
    };

    let submitting = move || auth.snapshot.with(|s| s.is_submitting);

    view! {
        <div class="login-page">
            <div class="login-card">
                <h1>"Partner Portal"</h1>
                <p class="login-card__subtitle">"Sign in to your account"</p>
                <form class="login-form" on:submit=on_submit>
                    <input
                        class="login-input"
                        type="email"
                        autocomplete="email"
                        placeholder="you@example.com"
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    <input
                        class="login-input"
                        type="password"
                        autocomplete="current-password"
                        placeholder="Password"
                        prop:value=move || password.get()
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                    <label class="login-remember">
                        <input
                            type="checkbox"
                            prop:checked=move || remember.get()
                            on:change=move |ev| remember.set(event_target_checked(&ev))
                        />
                        "Remember my email"
                    </label>
                    <button class="login-button" type="submit" disabled=submitting>
                        {move || if submitting() { "Signing in..." } else { "Sign In" }}
                    </button>
                </form>
                <Show when=move || !info.get().is_empty()>
                    <p class="login-message">{move || info.get()}</p>
                </Show>
                <div class="login-links">
                    <a href="/forgot-password">"Forgot password?"</a>
                    <a href="/signup">"Create an account"</a>
                </div>
            </div>
        </div>
    }
}
