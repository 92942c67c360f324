//! Reusable UI component modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Components read shared auth state from Leptos context. The guards decide
//! whether a route renders at all; the rest is page chrome.

pub mod debug_email_label;
pub mod guards;
