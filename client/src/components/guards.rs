//! Route guards.
//!
//! SYSTEM CONTEXT
//! ==============
//! Authenticated routes nest their page inside [`AppLayout`] (signed-in
//! check, remembers the attempted path) and [`OnboardingGuard`] (routes users
//! without a profile to `/onboard` and users with one away from it). Both
//! render a loading indicator until every resolution phase has settled, so a
//! page never sees a half-resolved user.

use identity::AuthSnapshot;
use identity::guard::{GuardDecision, app_layout_guard, onboarding_guard};
use leptos::prelude::*;
use leptos_router::components::Redirect;
use leptos_router::hooks::use_location;

use crate::state::auth::AuthState;
use crate::util::query::with_from;

#[component]
pub fn LoadingIndicator() -> impl IntoView {
    view! {
        <div class="portal-loading" role="status" aria-live="polite">
            <span class="portal-loading__spinner"></span>
            <span class="portal-loading__label">"Loading..."</span>
        </div>
    }
}

/// Outer guard for every signed-in route.
#[component]
pub fn AppLayout(children: ChildrenFn) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let location = use_location();
    let decision = Memo::new(move |_| {
        let input = auth.snapshot.with(AuthSnapshot::guard_input);
        app_layout_guard(&input, &location.pathname.get())
    });
    view! {
        <div class="app-layout">{guarded(decision, children)}</div>
    }
}

#[component]
pub fn OnboardingGuard(children: ChildrenFn) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let location = use_location();
    let decision = Memo::new(move |_| {
        let input = auth.snapshot.with(AuthSnapshot::guard_input);
        onboarding_guard(&input, &location.pathname.get())
    });
    guarded(decision, children)
}

fn guarded(decision: Memo<GuardDecision>, children: ChildrenFn) -> impl IntoView {
    move || match decision.get() {
        GuardDecision::Loading => view! { <LoadingIndicator/> }.into_any(),
        GuardDecision::Redirect { to, from } => {
            let path = with_from(to, from.as_deref());
            view! { <Redirect path=path/> }.into_any()
        }
        GuardDecision::Render => children().into_any(),
    }
}
