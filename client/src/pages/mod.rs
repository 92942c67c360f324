//! Page modules for route-level screens.
//!
//! ARCHITECTURE
//! ============
//! Each page owns route-scoped orchestration (form drafts, action dispatch,
//! post-action navigation) and leaves auth state transitions to the identity
//! context.

pub mod home;
pub mod login;
pub mod onboard;
pub mod password;
pub mod signup;
