use super::*;

#[test]
fn heading_names_known_organization_kinds() {
    assert_eq!(onboarding_heading(Some("advertiser")), "Set up your advertiser account");
    assert_eq!(onboarding_heading(Some("affiliate")), "Set up your affiliate account");
    assert_eq!(onboarding_heading(Some("agency")), "Set up your agency account");
}

#[test]
fn heading_falls_back_for_missing_or_unknown_kind() {
    assert_eq!(onboarding_heading(None), "Welcome to the Partner Portal");
    assert_eq!(onboarding_heading(Some("platform_owner")), "Welcome to the Partner Portal");
}
