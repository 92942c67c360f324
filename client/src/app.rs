//! Root application component with routing and the auth context provider.

use leptos::prelude::*;
use leptos_meta::{MetaTags, Stylesheet, Title, provide_meta_context};
use leptos_router::{
    ParamSegment, StaticSegment,
    components::{Route, Router, Routes},
};

use crate::components::guards::{AppLayout, OnboardingGuard};
use crate::pages::{
    home::HomePage,
    login::LoginPage,
    onboard::OnboardPage,
    password::{ForgotPasswordPage, ResetPasswordPage},
    signup::SignUpPage,
};
use crate::state::auth::AuthState;

/// HTML shell rendered on the server for SSR + hydration.
pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                <AutoReload options=options.clone()/>
                <HydrationScripts options/>
                <MetaTags/>
            </head>
            <body>
                <App/>
            </body>
        </html>
    }
}

/// Root application component.
///
/// Provides the auth state and sets up client-side routing. Signed-in routes
/// are wrapped in the route guards; the auth pages are public.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();
    AuthState::provide();

    view! {
        <Stylesheet id="leptos" href="/pkg/portal.css"/>
        <Title text="Partner Portal"/>

        <Router>
            <Routes fallback=|| "Page not found.".into_view()>
                <Route path=StaticSegment("login") view=LoginPage/>
                <Route path=StaticSegment("signup") view=SignUpPage/>
                <Route path=StaticSegment("forgot-password") view=ForgotPasswordPage/>
                <Route path=StaticSegment("reset-password") view=ResetPasswordPage/>
                <Route
                    path=StaticSegment("onboard")
                    view=|| view! { <OnboardingGuard><OnboardPage/></OnboardingGuard> }
                />
                <Route
                    path=(StaticSegment("onboard"), ParamSegment("kind"))
                    view=|| view! { <OnboardingGuard><OnboardPage/></OnboardingGuard> }
                />
                <Route
                    path=StaticSegment("")
                    view=|| view! { <AppLayout><OnboardingGuard><HomePage/></OnboardingGuard></AppLayout> }
                />
            </Routes>
        </Router>
    }
}
