use super::*;

/// # Safety
/// Env-mutating tests share one process; every test here clears the same keys
/// first and uses a single lock to serialize access.
unsafe fn clear_portal_env() {
    unsafe {
        std::env::remove_var("PORTAL_IDENTITY_URL");
        std::env::remove_var("PORTAL_IDENTITY_ANON_KEY");
        std::env::remove_var("PORTAL_BACKEND_URL");
        std::env::remove_var("PORTAL_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("PORTAL_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("PORTAL_STATE_FILE");
    }
}

static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_IDENTITY_URL", "https://id.example.test/");
        std::env::set_var("PORTAL_IDENTITY_ANON_KEY", "anon");
        std::env::set_var("PORTAL_BACKEND_URL", "https://api.example.test/v1/");
    }

    let cfg = PortalConfig::from_env().unwrap();
    assert_eq!(cfg.identity_url, "https://id.example.test");
    assert_eq!(cfg.identity_auth_url(), "https://id.example.test/auth/v1");
    assert_eq!(cfg.backend_url, "https://api.example.test/v1");
    assert_eq!(cfg.identity_anon_key, "anon");
    assert_eq!(cfg.timeouts, HttpTimeouts::default());
    assert_eq!(cfg.state_file, PathBuf::from(DEFAULT_STATE_FILE));

    unsafe { clear_portal_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_IDENTITY_URL", "http://localhost:54321");
        std::env::set_var("PORTAL_IDENTITY_ANON_KEY", "anon");
        std::env::set_var("PORTAL_BACKEND_URL", "http://localhost:8080");
        std::env::set_var("PORTAL_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("PORTAL_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("PORTAL_STATE_FILE", "/tmp/portal.json");
    }

    let cfg = PortalConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.state_file, PathBuf::from("/tmp/portal.json"));

    unsafe { clear_portal_env() };
}

#[test]
fn from_env_missing_key_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_IDENTITY_URL", "https://id.example.test");
        std::env::set_var("PORTAL_BACKEND_URL", "https://api.example.test");
    }

    let err = PortalConfig::from_env().unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "PORTAL_IDENTITY_ANON_KEY" });

    unsafe { clear_portal_env() };
}

#[test]
fn from_env_rejects_schemeless_url() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_IDENTITY_URL", "id.example.test");
        std::env::set_var("PORTAL_IDENTITY_ANON_KEY", "anon");
        std::env::set_var("PORTAL_BACKEND_URL", "https://api.example.test");
    }

    let err = PortalConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("PORTAL_IDENTITY_URL"));

    unsafe { clear_portal_env() };
}

#[test]
fn normalize_base_url_cases() {
    assert_eq!(normalize_base_url("https://a.test//"), Some("https://a.test".to_owned()));
    assert_eq!(normalize_base_url(" http://a.test/api "), Some("http://a.test/api".to_owned()));
    assert_eq!(normalize_base_url("ftp://a.test"), None);
    assert_eq!(normalize_base_url("https://"), None);
    assert_eq!(normalize_base_url(""), None);
}

#[test]
fn from_parts_normalizes_and_requires_key() {
    let cfg = PortalConfig::from_parts("https://id.example.test/", " anon ", "https://api.example.test/").unwrap();
    assert_eq!(cfg.identity_url, "https://id.example.test");
    assert_eq!(cfg.identity_anon_key, "anon");
    assert_eq!(cfg.backend_url, "https://api.example.test");

    assert_eq!(
        PortalConfig::from_parts("https://id.example.test", "  ", "https://api.example.test"),
        Err(ConfigError::Missing { var: "PORTAL_IDENTITY_ANON_KEY" })
    );
    assert!(matches!(
        PortalConfig::from_parts("https://id.example.test", "anon", "api.example.test"),
        Err(ConfigError::Invalid { var: "PORTAL_BACKEND_URL", .. })
    ));
}
