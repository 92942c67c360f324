//! Utility helpers shared across client UI modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate browser/environment concerns (storage, wall clock,
//! build-time config) from page and component logic so the `identity` crate
//! sees plain trait objects.

pub mod clock;
pub mod config;
pub mod local_storage;
pub mod query;
