//! # portal-client
//!
//! Leptos + WASM frontend for the partner portal dashboard.
//!
//! This crate contains the route pages, the route guards, and the browser
//! bindings (localStorage, wall clock, build-time config) that the
//! `identity` crate's auth context runs on.

pub mod app;
pub mod components;
pub mod pages;
pub mod state;
pub mod util;

/// WASM entry point: attach to the server-rendered markup.
#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
    leptos::mount::hydrate_body(app::App);
}
