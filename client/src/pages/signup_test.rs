use super::*;

fn invite() -> InviteToken {
    InviteToken {
        organization_id: 42,
        organization_name: "Acme Media".into(),
        email: "new.hire@acme.test".into(),
        timestamp: Some(1_700_000_000_000),
    }
}

#[test]
fn missing_or_blank_token_is_open_registration() {
    assert_eq!(invite_from_query(None).unwrap(), None);
    assert_eq!(invite_from_query(Some("  ")).unwrap(), None);
}

#[test]
fn valid_token_decodes() {
    let token = invite().encode();
    assert_eq!(invite_from_query(Some(&token)).unwrap(), Some(invite()));
}

#[test]
fn garbage_token_is_rejected() {
    assert!(matches!(invite_from_query(Some("%%not-base64%%")), Err(InviteError::Encoding)));
}

#[test]
fn banner_names_organization_when_known() {
    assert_eq!(invite_banner(&invite()), "You have been invited to join Acme Media.");
    let unnamed = InviteToken { organization_name: String::new(), ..invite() };
    assert_eq!(invite_banner(&unnamed), "You have been invited to join an organization.");
}
