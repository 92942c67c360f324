//! # identity
//!
//! Session bootstrap and access control for the affiliate portal dashboard.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser client (`client/`) and the operator CLI (`cli/`) both build an
//! [`context::AuthContext`] from the pieces in this crate:
//!
//! ```text
//! SessionStore ──events──▶ AuthContext ──▶ ProfileResolver ──▶ OrganizationResolver
//!                              │
//!                              └──watch──▶ route guards / UI
//! ```
//!
//! DESIGN
//! ======
//! Nothing here owns a global. Every collaborator is constructed by the entry
//! point and passed in, and only `tokio::sync` primitives are used on the hot
//! path so the same code runs under the tokio runtime natively and under
//! `spawn_local` in the browser.

pub mod backend;
pub mod clock;
pub mod config;
pub mod context;
pub mod debug;
pub mod error;
pub mod gotrue;
pub mod guard;
pub mod invite;
pub mod organization;
pub mod profile;
pub mod session;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ActionError, AuthContext, AuthPhase, AuthSnapshot, SignUpOutcome};
pub use error::{AuthError, BackendError};
pub use gotrue::GoTrueStore;
pub use session::{Session, SessionEvent, SessionEventKind, SessionStore};
