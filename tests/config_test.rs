//! Configuration loading from the environment.

use std::time::Duration;

use gameforum::config::Config;
use serial_test::serial;

const VARS: [&str; 7] = [
    "DATABASE_PATH",
    "UPLOADS_DIR",
    "WEB_PORT",
    "CORS_ALLOW_ORIGIN",
    "JWT_SECRET",
    "JWT_ISSUER",
    "JWT_TTL_MINUTES",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_with_secret() {
    clear_env();
    std::env::set_var("JWT_SECRET", "x".repeat(40));

    let config = Config::from_env().expect("config");
    assert_eq!(config.web_port, 8080);
    assert_eq!(config.jwt_issuer, "gameforum");
    assert_eq!(config.jwt_ttl, Duration::from_secs(120 * 60));
    assert!(config.cors_allow_origin.is_none());
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn test_missing_secret_fails() {
    clear_env();
    assert!(Config::from_env().is_err());
}

#[test]
#[serial]
fn test_overrides_and_validation() {
    clear_env();
    std::env::set_var("JWT_SECRET", "short");
    std::env::set_var("WEB_PORT", "9090");
    std::env::set_var("JWT_TTL_MINUTES", "15");
    std::env::set_var("CORS_ALLOW_ORIGIN", "http://localhost:5173");

    let config = Config::from_env().expect("config");
    assert_eq!(config.web_port, 9090);
    assert_eq!(config.jwt_ttl, Duration::from_secs(15 * 60));
    assert_eq!(
        config.cors_allow_origin.as_deref(),
        Some("http://localhost:5173")
    );
    assert!(config.validate().is_err());

    std::env::set_var("WEB_PORT", "not-a-port");
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
#[serial]
fn test_oversized_ttl_is_a_config_error() {
    clear_env();
    std::env::set_var("JWT_SECRET", "x".repeat(40));
    std::env::set_var("JWT_TTL_MINUTES", u64::MAX.to_string());

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("JWT_TTL_MINUTES"));

    clear_env();
}
