use super::*;
use crate::error::BackendError;
use crate::test_helpers::{FakeBackend, ManualClock, sample_org, sample_profile, sample_session};

fn resolver(backend: &Arc<FakeBackend>, clock: &Arc<ManualClock>) -> ProfileResolver {
    let backend: Arc<dyn BackendApi> = backend.clone();
    let clock: Arc<dyn Clock> = clock.clone();
    ProfileResolver::new(backend, clock)
}

// =============================================================================
// UserProfile::from_backend
// =============================================================================

#[test]
fn from_backend_maps_fields() {
    let profile = UserProfile::from_backend(&sample_profile("Jane", Some(42)));
    assert_eq!(profile.first_name, "Jane");
    assert_eq!(profile.last_name, "Doe");
    assert_eq!(profile.role.name, "Advertiser Admin");
    assert_eq!(profile.organization, OrganizationRef { id: Some(42), name: String::new() });
}

#[test]
fn from_backend_defaults_missing_fields() {
    let profile = UserProfile::from_backend(&BackendProfile::default());
    assert_eq!(profile.first_name, "");
    assert_eq!(profile.last_name, "");
    assert_eq!(profile.role.name, DEFAULT_ROLE);
    assert_eq!(profile.organization.id, None);
}

#[test]
fn from_backend_role_id_without_name_uses_id() {
    let raw = BackendProfile { role_id: Some(1001), role_name: Some("  ".into()), ..BackendProfile::default() };
    assert_eq!(UserProfile::from_backend(&raw).role.name, "1001");
}

#[test]
fn from_backend_parses_snake_case_json() {
    let raw: BackendProfile =
        serde_json::from_str(r#"{"first_name":"Jane","last_name":null,"organization_id":7,"extra":true}"#).unwrap();
    let profile = UserProfile::from_backend(&raw);
    assert_eq!(profile.first_name, "Jane");
    assert_eq!(profile.last_name, "");
    assert_eq!(profile.organization.id, Some(7));
}

#[test]
fn with_organization_only_merges_matching_id() {
    let profile = UserProfile::from_backend(&sample_profile("Jane", Some(42)));
    assert_eq!(profile.clone().with_organization(&sample_org(42, "Acme")).organization.name, "Acme");
    assert_eq!(profile.with_organization(&sample_org(7, "Other")).organization.name, "");
}

#[test]
fn display_name_trims_missing_parts() {
    let profile = UserProfile { first_name: "Jane".into(), ..UserProfile::default() };
    assert_eq!(profile.display_name(), "Jane");
}

// =============================================================================
// permissions
// =============================================================================

#[test]
fn permission_matches_role_name_case_insensitively() {
    let profile = UserProfile { role: Role { name: "Affiliate Manager".into() }, ..UserProfile::default() };
    assert!(profile.has_permission("affiliate manager"));
    assert!(!profile.has_permission("Admin"));
}

#[test]
fn superuser_roles_pass_every_check() {
    let profile = UserProfile { role: Role { name: "Platform Owner".into() }, ..UserProfile::default() };
    assert!(profile.has_permission("campaigns.delete"));
}

#[test]
fn no_profile_has_no_permissions() {
    assert!(!has_permission(None, "User"));
}

// =============================================================================
// ProfileResolver
// =============================================================================

#[tokio::test]
async fn resolve_without_session_makes_no_call() {
    let backend = FakeBackend::new();
    let clock = ManualClock::new();
    assert_eq!(resolver(&backend, &clock).resolve(None).await, None);
    assert_eq!(backend.profile_calls(), 0);
}

#[tokio::test]
async fn resolve_with_expired_session_makes_no_call() {
    let backend = FakeBackend::new();
    let clock = ManualClock::new();
    let session = sample_session("u1", "t1");
    clock.advance_secs(3600);
    assert_eq!(resolver(&backend, &clock).resolve(Some(&session)).await, None);
    assert_eq!(backend.profile_calls(), 0);
}

#[tokio::test]
async fn resolve_maps_backend_profile() {
    let backend = FakeBackend::new();
    backend.set_profile("t1", Ok(Some(sample_profile("Jane", Some(42)))));
    let clock = ManualClock::new();

    let profile = resolver(&backend, &clock)
        .resolve(Some(&sample_session("u1", "t1")))
        .await
        .unwrap();
    assert_eq!(profile.first_name, "Jane");
    assert_eq!(profile.organization.id, Some(42));
    assert_eq!(backend.profile_calls(), 1);
}

#[tokio::test]
async fn resolve_falls_back_on_backend_failure() {
    let backend = FakeBackend::new();
    backend.set_profile("t1", Err(BackendError::Server { status: 500, body: String::new() }));
    let clock = ManualClock::new();

    let profile = resolver(&backend, &clock)
        .resolve(Some(&sample_session("u1", "t1")))
        .await
        .unwrap();
    assert_eq!(profile.first_name, "Jane");
    assert_eq!(profile.last_name, "Doe");
    assert_eq!(profile.role.name, "User");
    assert_eq!(profile.organization.name, "");
    assert_eq!(profile.organization.id, None);
}

#[tokio::test]
async fn resolve_falls_back_on_network_failure() {
    let backend = FakeBackend::new();
    let clock = ManualClock::new();
    let profile = resolver(&backend, &clock)
        .resolve(Some(&sample_session("u1", "unknown-token")))
        .await;
    assert_eq!(profile.map(|p| p.role.name), Some("User".to_owned()));
}

#[tokio::test]
async fn resolve_reports_absent_profile() {
    let backend = FakeBackend::new();
    backend.set_profile("t1", Ok(None));
    let clock = ManualClock::new();
    assert_eq!(
        resolver(&backend, &clock)
            .resolve(Some(&sample_session("u1", "t1")))
            .await,
        None
    );
}
