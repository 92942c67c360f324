//! Registration page, optionally driven by an organization invitation.
//!
//! An invitation arrives as `?token=<base64 json>`. A valid token fixes the
//! email address and joins the new account to the inviting organization; an
//! invalid one is reported and the form falls back to open registration.

#[cfg(test)]
#[path = "signup_test.rs"]
mod signup_test;

use identity::SignUpOutcome;
use identity::invite::{InviteError, InviteToken};
use identity::validation::SignUpForm;
use leptos::prelude::*;
use leptos_router::NavigateOptions;
use leptos_router::hooks::{use_navigate, use_query_map};

use crate::state::auth::AuthState;

pub const CONFIRMATION_MESSAGE: &str = "Check your inbox to confirm your email address, then sign in.";
pub const INVALID_INVITE_MESSAGE: &str = "This invitation link is not valid. You can still register without it.";

/// Decode the `token` query value. No token is not an error.
pub fn invite_from_query(token: Option<&str>) -> Result<Option<InviteToken>, InviteError> {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => InviteToken::decode(raw).map(Some),
        None => Ok(None),
    }
}

/// Heading line for an invitation.
pub fn invite_banner(invite: &InviteToken) -> String {
    if invite.organization_name.is_empty() {
        "You have been invited to join an organization.".to_owned()
    } else {
        format!("You have been invited to join {}.", invite.organization_name)
    }
}

#[component]
pub fn SignUpPage() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let query = use_query_map();
    let navigate = use_navigate();

    let invite = Memo::new(move |_| {
        let token = query.with(|q| q.get("token"));
        invite_from_query(token.as_deref()).map_err(|e| e.to_string())
    });

    let first_name = RwSignal::new(String::new());
    let last_name = RwSignal::new(String::new());
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let confirm_password = RwSignal::new(String::new());
    let info = RwSignal::new(String::new());

    Effect::new(move || match invite.get() {
        Ok(Some(token)) => email.set(token.email),
        Ok(None) => {}
        Err(e) => {
            #[cfg(feature = "hydrate")]
            log::warn!("rejected invite token: {e}");
            let _ = e;
            info.set(INVALID_INVITE_MESSAGE.to_owned());
        }
    });

    Effect::new(move || {
        let snapshot = auth.snapshot.get();
        if snapshot.is_authenticated && !snapshot.is_loading() {
            navigate("/", NavigateOptions { replace: true, ..NavigateOptions::default() });
        }
    });

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.snapshot.get_untracked().is_submitting {
            return;
        }
        let form = SignUpForm {
            email: email.get_untracked(),
            password: password.get_untracked(),
            confirm_password: confirm_password.get_untracked(),
            first_name: first_name.get_untracked(),
            last_name: last_name.get_untracked(),
        };
        let invite = invite.get_untracked().ok().flatten();
        info.set(String::new());
        auth.spawn_action(info, move |services| async move {
            if services.ctx.sign_up(&form, invite.as_ref()).await? == SignUpOutcome::ConfirmationRequired {
                info.set(CONFIRMATION_MESSAGE.to_owned());
            }
            Ok(())
        });
    };

    let invited = move || invite.with(|i| matches!(i, Ok(Some(_))));
    let submitting = move || auth.snapshot.with(|s| s.is_submitting);

    view! {
        <div class="login-page">
            <div class="login-card">
                <h1>"Create your account"</h1>
                <Show when=invited>
                    <p class="login-card__subtitle">
                        {move || invite.get().ok().flatten().map(|i| invite_banner(&i)).unwrap_or_default()}
                    </p>
                </Show>
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
                    <input
                        class="login-input"
                        type="email"
                        autocomplete="email"
                        placeholder="you@example.com"
                        readonly=invited
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    <input
                        class="login-input"
                        type="password"
                        autocomplete="new-password"
                        placeholder="Password"
                        prop:value=move || password.get()
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                    <input
                        class="login-input"
                        type="password"
                        autocomplete="new-password"
                        placeholder="Confirm password"
                        prop:value=move || confirm_password.get()
                        on:input=move |ev| confirm_password.set(event_target_value(&ev))
                    />
                    <button class="login-button" type="submit" disabled=submitting>
                        {move || if submitting() { "Creating account..." } else { "Create Account" }}
                    </button>
                </form>
                <Show when=move || !info.get().is_empty()>
                    <p class="login-message">{move || info.get()}</p>
                </Show>
                <div class="login-links">
                    <a href="/login">"Already have an account? Sign in"</a>
                </div>
            </div>
        </div>
    }
}
