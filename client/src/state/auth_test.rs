use std::sync::Arc;

use identity::clock::SystemClock;
use identity::storage::MemoryStore;
use identity::validation::ValidationError;

use super::*;

#[test]
fn describe_validation_errors_as_sentences() {
    assert_eq!(
        describe(&ActionError::Validation(ValidationError::InvalidEmail)),
        "Enter a valid email address."
    );
    assert_eq!(
        describe(&ActionError::Validation(ValidationError::PasswordTooShort { min: 8 })),
        "Password must be at least 8 characters."
    );
    assert_eq!(
        describe(&ActionError::Validation(ValidationError::Required("first name"))),
        "First name is required."
    );
}

#[test]
fn describe_provider_errors() {
    assert_eq!(describe(&ActionError::Auth(AuthError::InvalidCredentials)), "Invalid email or password.");
    assert_eq!(describe(&ActionError::Auth(AuthError::RateLimited)), "Too many attempts. Try again later.");
    assert_eq!(
        describe(&ActionError::Auth(AuthError::Network("timeout".into()))),
        describe(&ActionError::Backend(BackendError::Network("refused".into())))
    );
    assert_eq!(
        describe(&ActionError::Auth(AuthError::Unknown("weak_password".into()))),
        "Sign-in service error: weak_password."
    );
}

#[test]
fn describe_lost_session() {
    assert_eq!(describe(&ActionError::NotSignedIn), "Your session has ended. Sign in again.");
    assert_eq!(describe(&ActionError::Backend(BackendError::Unauthorized)), describe(&ActionError::NotSignedIn));
}

#[test]
fn sentence_handles_empty_and_punctuated_input() {
    assert_eq!(sentence(""), "");
    assert_eq!(sentence("done."), "Done.");
}

fn config() -> PortalConfig {
    PortalConfig::from_parts("http://127.0.0.1:1", "anon", "http://127.0.0.1:2").unwrap()
}

#[test]
fn build_services_share_one_storage() {
    let storage = Arc::new(MemoryStore::new());
    let services = build_services(
        &config(),
        storage.clone(),
        Arc::new(SystemClock),
        "http://localhost:3000/reset-password".to_owned(),
    )
    .unwrap();

    services.prefs.set_remembered_email("jane@example.com", true).unwrap();
    services.debug.enable().unwrap();
    assert_eq!(storage.get(identity::storage::keys::REMEMBERED_EMAIL).as_deref(), Some("jane@example.com"));
    assert!(services.debug.load().enabled);
    assert_eq!(services.ctx.snapshot(), AuthSnapshot::default());
}

#[test]
fn actions_without_services_report_unavailable() {
    let owner = Owner::new();
    owner.with(|| {
        let state = AuthState::new();
        let info = RwSignal::new(String::new());
        state.spawn_action(info, |_| async { Ok(()) });
        assert_eq!(info.get_untracked(), UNAVAILABLE_MESSAGE);

        state.startup_error.set(Some("missing required env var PORTAL_IDENTITY_ANON_KEY".into()));
        state.spawn_action(info, |_| async { Ok(()) });
        assert!(info.get_untracked().contains("PORTAL_IDENTITY_ANON_KEY"));

        assert_eq!(state.enable_debug(), Err(UNAVAILABLE_MESSAGE.to_owned()));
    });
}
