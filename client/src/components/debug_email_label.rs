//! User email label that doubles as the hidden debug switch.
//!
//! SYSTEM CONTEXT
//! ==============
//! Five clicks on the label within three seconds turn debug mode on. While
//! it is on, a small form lets support staff point backend calls at another
//! portal API. Debug mode left on without a URL switches itself off after
//! 24 hours of continuous residence in that state.
//!
//! TRADE-OFFS
//! ==========
//! The expiry timer lives with this component: it only runs while a page
//! showing the label is mounted, and a reload starts a fresh period.

#[cfg(test)]
#[path = "debug_email_label_test.rs"]
mod debug_email_label_test;

use identity::debug::{ClickActivator, DebugOverride};
use leptos::prelude::*;

use crate::state::auth::AuthState;
use crate::util::clock::now_ms;

/// Status line for the debug panel.
pub fn override_status(state: &DebugOverride) -> String {
    match state.active_backend_url() {
        Some(url) => format!("Backend: {url}"),
        None if state.enabled => "Backend: default (debug mode turns off after 24h without a URL)".to_owned(),
        None => String::new(),
    }
}

#[component]
pub fn DebugEmailLabel(#[prop(into)] email: Signal<String>) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let clicks = RwSignal::new(ClickActivator::default());
    let url_draft = RwSignal::new(String::new());
    let info = RwSignal::new(String::new());

    #[cfg(feature = "hydrate")]
    install_expiry_timer(auth);
    #[cfg(feature = "hydrate")]
    let click_reset = StoredValue::new_local(None::<gloo_timers::callback::Timeout>);
    #[cfg(feature = "hydrate")]
    on_cleanup(move || click_reset.set_value(None));

    let on_label_click = move |_| {
        let mut activated = false;
        clicks.update(|c| activated = c.register(now_ms()));
        if activated {
            info.set(auth.enable_debug().err().unwrap_or_default());
        }
        #[cfg(feature = "hydrate")]
        arm_click_reset(clicks, click_reset);
    };

    let on_set_url = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        match auth.set_debug_url(&url_draft.get_untracked()) {
            Ok(url) => {
                url_draft.set(url);
                info.set(String::new());
                refresh_profile(auth, info);
            }
            Err(e) => info.set(e),
        }
    };

    let on_reset = move |_| match auth.reset_debug_url() {
        Ok(()) => {
            url_draft.set(String::new());
            info.set(String::new());
            refresh_profile(auth, info);
        }
        Err(e) => info.set(e),
    };

    let on_disable = move |_| match auth.disable_debug() {
        Ok(()) => {
            info.set(String::new());
            refresh_profile(auth, info);
        }
        Err(e) => info.set(e),
    };

    view! {
        <span class="debug-email">
            <span class="debug-email__label" on:click=on_label_click>{move || email.get()}</span>
            <Show when=move || auth.debug.get().enabled>
                <div class="debug-email__panel">
                    <span class="debug-email__badge">"DEBUG"</span>
                    <form class="debug-email__form" on:submit=on_set_url>
                        <input
                            class="debug-email__input"
                            type="url"
                            placeholder="https://api.staging.example.com"
                            prop:value=move || url_draft.get()
                            on:input=move |ev| url_draft.set(event_target_value(&ev))
                        />
                        <button type="submit">"Use backend"</button>
                        <button type="button" on:click=on_reset>"Reset"</button>
                        <button type="button" on:click=on_disable>"Turn off"</button>
                    </form>
                    <span class="debug-email__status">{move || override_status(&auth.debug.get())}</span>
                </div>
            </Show>
            <Show when=move || !info.get().is_empty()>
                <span class="debug-email__message">{move || info.get()}</span>
            </Show>
        </span>
    }
}

/// Reload profile data from whichever backend is now active.
fn refresh_profile(auth: AuthState, info: RwSignal<String>) {
    auth.spawn_action(info, |services| async move {
        services.ctx.refresh_profile().await;
        Ok(())
    });
}

/// Drop a partial click sequence once its window lapses.
#[cfg(feature = "hydrate")]
fn arm_click_reset(
    clicks: RwSignal<ClickActivator>,
    pending: StoredValue<Option<gloo_timers::callback::Timeout>, LocalStorage>,
) {
    use gloo_timers::callback::Timeout;

    let Some(delay) = clicks.with_untracked(|c| c.resets_in(now_ms())) else {
        pending.set_value(None);
        return;
    };
    let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
    pending.set_value(Some(Timeout::new(millis, move || clicks.update(|c| c.expire(now_ms())))));
}

#[cfg(feature = "hydrate")]
fn install_expiry_timer(auth: AuthState) {
    use gloo_timers::callback::Timeout;
    use identity::debug::DebugExpiry;

    let timer = StoredValue::new_local((DebugExpiry::default(), None::<Timeout>));
    Effect::new(move || {
        let state = auth.debug.get();
        timer.update_value(|(expiry, pending)| {
            // A fired (or never started) timer starts a fresh period.
            if pending.is_none() {
                *expiry = DebugExpiry::default();
            }
            match expiry.observe(&state, now_ms()) {
                Some(_) if pending.is_some() => {}
                Some(delay) => {
                    let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
                    *pending = Some(Timeout::new(millis, move || auth.expire_debug()));
                }
                None => *pending = None,
            }
        });
    });
    on_cleanup(move || timer.update_value(|(_, pending)| *pending = None));
}
