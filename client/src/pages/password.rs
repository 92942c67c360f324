//! Forgot-password and reset-password pages.
//!
//! SYSTEM CONTEXT
//! ==============
//! The forgot page asks the identity provider to email a recovery link that
//! points back at `/reset-password`. The provider appends the recovery
//! session to the link's fragment; the reset page installs that session
//! before letting the user choose a new password.

#[cfg(test)]
#[path = "password_test.rs"]
mod password_test;

use identity::gotrue::RedirectTokens;
use leptos::prelude::*;

use crate::state::auth::AuthState;

pub const RESET_SENT_MESSAGE: &str = "If an account exists for that address, a reset link is on its way.";
pub const PASSWORD_UPDATED_MESSAGE: &str = "Your password has been updated.";
pub const INVALID_LINK_MESSAGE: &str = "This reset link is invalid or has expired. Request a new one.";

/// How the reset page treats the current URL fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Installing the session carried by the link.
    Checking,
    /// Ready to accept a new password.
    Ready,
    Invalid,
}

/// Initial status for a fragment: links carrying tokens must be checked
/// first; without one, a signed-in user may change their password directly.
pub fn initial_link_status(fragment: &str) -> LinkStatus {
    if RedirectTokens::parse(fragment).is_some() { LinkStatus::Checking } else { LinkStatus::Ready }
}

#[component]
pub fn ForgotPasswordPage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let email = RwSignal::new(String::new());
    let info = RwSignal::new(String::new());

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.snapshot.get_untracked().is_submitting {
            return;
        }
        let email_value = email.get_untracked();
        info.set(String::new());
        auth.spawn_action(info, move |services| async move {
            services.ctx.forgot_password(&email_value).await?;
            info.set(RESET_SENT_MESSAGE.to_owned());
            Ok(())
        });
    };

    view! {
        <div class="login-page">
            <div class="login-card">
                <h1>"Reset your password"</h1>
                <p class="login-card__subtitle">"We will email you a link to choose a new one."</p>
                <form class="login-form" on:submit=on_submit>
                    <input
                        class="login-input"
                        type="email"
                        autocomplete="email"
                        placeholder="you@example.com"
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    <button
                        class="login-button"
                        type="submit"
                        disabled=move || auth.snapshot.with(|s| s.is_submitting)
                    >
                        "Send Reset Link"
                    </button>
                </form>
                <Show when=move || !info.get().is_empty()>
                    <p class="login-message">{move || info.get()}</p>
                </Show>
                <div class="login-links">
                    <a href="/login">"Back to sign in"</a>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn ResetPasswordPage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let status = RwSignal::new(LinkStatus::Ready);
    let password = RwSignal::new(String::new());
    let confirm = RwSignal::new(String::new());
    let info = RwSignal::new(String::new());
    let done = RwSignal::new(false);

    #[cfg(feature = "hydrate")]
    {
        let location = web_sys::window().map(|w| w.location());
        let fragment = location.as_ref().and_then(|l| l.hash().ok()).unwrap_or_default();
        status.set(initial_link_status(&fragment));
        if status.get_untracked() == LinkStatus::Checking {
            match auth.services() {
                Some(services) => leptos::task::spawn_local(async move {
                    match services.gotrue.set_session_from_redirect(&fragment).await {
                        Ok(_) => status.set(LinkStatus::Ready),
                        Err(e) => {
                            log::warn!("recovery link rejected: {e}");
                            status.set(LinkStatus::Invalid);
                        }
                    }
                    // Keep tokens out of history and bookmarks.
                    if let Some(location) = location {
                        let _ = location.set_hash("");
                    }
                }),
                None => status.set(LinkStatus::Invalid),
            }
        }
    }

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.snapshot.get_untracked().is_submitting || status.get_untracked() != LinkStatus::Ready {
            return;
        }
        let password_value = password.get_untracked();
        let confirm_value = confirm.get_untracked();
        info.set(String::new());
        auth.spawn_action(info, move |services| async move {
            services.ctx.reset_password(&password_value, &confirm_value).await?;
            password.set(String::new());
            confirm.set(String::new());
            done.set(true);
            info.set(PASSWORD_UPDATED_MESSAGE.to_owned());
            Ok(())
        });
    };

    view! {
        <div class="login-page">
            <div class="login-card">
                <h1>"Choose a new password"</h1>
                <Show when=move || status.get() == LinkStatus::Checking>
                    <p class="login-card__subtitle">"Checking your reset link..."</p>
                </Show>
                <Show when=move || status.get() == LinkStatus::Invalid>
                    <p class="login-message">{INVALID_LINK_MESSAGE}</p>
                    <div class="login-links">
                        <a href="/forgot-password">"Request a new link"</a>
                    </div>
                </Show>
                <Show when=move || status.get() == LinkStatus::Ready && !done.get()>
                    <form class="login-form" on:submit=on_submit>
                        <input
                            class="login-input"
                            type="password"
                            autocomplete="new-password"
                            placeholder="New password"
                            prop:value=move || password.get()
                            on:input=move |ev| password.set(event_target_value(&ev))
                        />
                        <input
                            class="login-input"
                            type="password"
                            autocomplete="new-password"
                            placeholder="Confirm new password"
                            prop:value=move || confirm.get()
                            on:input=move |ev| confirm.set(event_target_value(&ev))
                        />
                        <button
                            class="login-button"
                            type="submit"
                            disabled=move || auth.snapshot.with(|s| s.is_submitting)
                        >
                            "Update Password"
                        </button>
                    </form>
                </Show>
                <Show when=move || !info.get().is_empty()>
                    <p class="login-message">{move || info.get()}</p>
                </Show>
                <Show when=move || done.get()>
                    <div class="login-links">
                        <a href="/">"Continue to the dashboard"</a>
                    </div>
                </Show>
            </div>
        </div>
    }
}
