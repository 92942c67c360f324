use super::*;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("portal-cli").chain(args.iter().copied()))
}

fn temp_state_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("portal-cli-{name}-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

// =============================================================================
// CONFIG
// =============================================================================

#[test]
fn portal_config_from_flags() {
    let cli = parse(&[
        "--identity-url",
        "https://id.example.test/",
        "--anon-key",
        "anon",
        "--backend-url",
        "https://api.example.test",
        "--request-timeout-secs",
        "5",
        "--state-file",
        "/tmp/portal-test.json",
        "status",
    ])
    .unwrap();

    let config = cli.portal_config().unwrap();
    assert_eq!(config.identity_url, "https://id.example.test");
    assert_eq!(config.backend_url, "https://api.example.test");
    assert_eq!(config.timeouts.request_secs, 5);
    assert_eq!(config.timeouts.connect_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
    assert_eq!(config.state_file, PathBuf::from("/tmp/portal-test.json"));
}

#[test]
fn portal_config_requires_urls_and_key() {
    let cli = parse(&["--anon-key", "anon", "--backend-url", "https://api.example.test", "status"]).unwrap();
    assert!(matches!(
        cli.portal_config(),
        Err(CliError::Config(ConfigError::Missing { var: "PORTAL_IDENTITY_URL" }))
    ));

    let cli = parse(&["--identity-url", "https://id.example.test", "--backend-url", "https://api.example.test", "status"])
        .unwrap();
    assert!(matches!(
        cli.portal_config(),
        Err(CliError::Config(ConfigError::Missing { var: "PORTAL_IDENTITY_ANON_KEY" }))
    ));
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[test]
fn signup_needs_email_or_invite() {
    assert!(parse(&["signup", "--first-name", "Jane", "--last-name", "Doe"]).is_err());
    assert!(parse(&["signup", "--first-name", "Jane", "--last-name", "Doe", "--invite", "abc"]).is_ok());
    assert!(parse(&["signup", "--first-name", "Jane", "--last-name", "Doe", "--email", "j@acme.test"]).is_ok());
}

#[test]
fn status_path_defaults_to_root() {
    let cli = parse(&["status"]).unwrap();
    assert!(matches!(cli.command, Command::Status { ref path } if path == "/"));
}

#[test]
fn password_flag_skips_prompt() {
    assert_eq!(password_or_prompt(Some("secret123")).unwrap(), "secret123");
}

// =============================================================================
// LOCAL COMMANDS
// =============================================================================

#[test]
fn debug_commands_persist_to_state_file() {
    let path = temp_state_file("debug");
    let state_file = path.to_string_lossy().into_owned();

    let cli = parse(&["--state-file", &state_file, "debug", "set-url", "https://api.staging.test/"]).unwrap();
    let Command::Debug(debug) = &cli.command else { panic!("expected debug command") };
    run_debug(&cli, debug).unwrap();

    let cli = parse(&["--state-file", &state_file, "debug", "enable"]).unwrap();
    let Command::Debug(debug) = &cli.command else { panic!("expected debug command") };
    run_debug(&cli, debug).unwrap();

    let store = DebugOverrideStore::new(Arc::new(FileStore::open(&path).unwrap()));
    assert_eq!(store.active_backend_url().as_deref(), Some("https://api.staging.test"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn invalid_debug_url_is_rejected() {
    let path = temp_state_file("debug-invalid");
    let state_file = path.to_string_lossy().into_owned();
    let cli = parse(&["--state-file", &state_file, "debug", "set-url", "staging"]).unwrap();
    let Command::Debug(debug) = &cli.command else { panic!("expected debug command") };
    assert!(matches!(run_debug(&cli, debug), Err(CliError::Debug(DebugError::InvalidUrl))));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn locale_round_trips_through_state_file() {
    let path = temp_state_file("locale");
    let state_file = path.to_string_lossy().into_owned();
    let cli = parse(&["--state-file", &state_file, "locale", "de"]).unwrap();
    run_locale(&cli, Some("de")).unwrap();

    let prefs = Preferences::new(Arc::new(FileStore::open(&path).unwrap()));
    assert_eq!(prefs.locale(), "de");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn invite_encode_rejects_bad_email() {
    let command = InviteCommand {
        command: InviteSubcommand::Encode {
            organization_id: 42,
            organization_name: "Acme".into(),
            email: "not-an-email".into(),
        },
    };
    assert!(matches!(run_invite(&command), Err(CliError::Invite(InviteError::InvalidEmail))));
}
