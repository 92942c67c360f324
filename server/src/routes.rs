//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Serves the portal's Leptos pages with server rendering, the hydration
//! bundle under `/pkg`, and a health check. Auth itself runs in the browser
//! against the identity provider, so server renders stop at the loading
//! state and hydration takes over.

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use leptos::prelude::*;
use leptos_axum::{LeptosRoutes, generate_route_list};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Leptos SSR routes plus static assets.
///
/// # Errors
///
/// Returns an error if the Leptos configuration cannot be loaded.
pub fn app() -> Result<Router, String> {
    let conf = get_configuration(None).map_err(|e| format!("leptos configuration: {e}"))?;
    let leptos_options = conf.leptos_options;
    let routes = generate_route_list(portal_client::app::App);
    let site_root = PathBuf::from(leptos_options.site_root.as_ref());

    let leptos_router = Router::new()
        .leptos_routes(&leptos_options, routes, {
            let opts = leptos_options.clone();
            move || portal_client::app::shell(opts.clone())
        })
        .with_state(leptos_options);

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .merge(leptos_router)
        .nest_service("/pkg", ServeDir::new(site_root.join("pkg")))
        .layer(TraceLayer::new_for_http()))
}

pub const DEFAULT_PORT: u16 = 3000;

/// Port from the `PORT` value, defaulting to [`DEFAULT_PORT`].
///
/// # Errors
///
/// Returns an error if the value is not a valid port number.
pub fn parse_port(raw: Option<&str>) -> Result<u16, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_PORT),
        Some(value) => value.parse().map_err(|_| format!("invalid PORT {value:?}")),
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
