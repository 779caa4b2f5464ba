use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Shortest accepted token signing secret, in characters.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Uploaded images (forum attachments, avatars)
    pub uploads_dir: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub cors_allow_origin: Option<String>,

    // Bearer tokens
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/gameforum.sqlite",
            )),

            uploads_dir: PathBuf::from(env_or_default("UPLOADS_DIR", "./data/uploads")),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            cors_allow_origin: optional_env("CORS_ALLOW_ORIGIN"),

            // Bearer tokens
            jwt_secret: required_env("JWT_SECRET")?,
            jwt_issuer: env_or_default("JWT_ISSUER", "gameforum"),
            jwt_ttl: ttl_from_minutes(parse_env_u64("JWT_TTL_MINUTES", 120)?)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.chars().count() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                name: "JWT_SECRET".to_string(),
                message: format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
            });
        }
        if self.jwt_issuer.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_ISSUER".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.jwt_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_TTL_MINUTES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn ttl_from_minutes(minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: "JWT_TTL_MINUTES".to_string(),
            message: format!("{minutes} minutes is out of range"),
        })
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secret: &str) -> Config {
        Config {
            database_path: PathBuf::from("./data/test.sqlite"),
            uploads_dir: PathBuf::from("./data/uploads"),
            web_host: "127.0.0.1".to_string(),
            web_port: 8080,
            cors_allow_origin: None,
            jwt_secret: secret.to_string(),
            jwt_issuer: "gameforum".to_string(),
            jwt_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(sample("too-short").validate().is_err());
        assert!(sample(&"x".repeat(31)).validate().is_err());
        assert!(sample(&"x".repeat(32)).validate().is_ok());
    }

    #[test]
    fn test_ttl_minutes_overflow_rejected() {
        assert_eq!(ttl_from_minutes(15).unwrap(), Duration::from_secs(900));
        let err = ttl_from_minutes(u64::MAX).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "JWT_TTL_MINUTES"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = sample(&"x".repeat(40));
        config.jwt_ttl = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(parse_env_u16("NONEXISTENT_PORT_VAR", 8080).unwrap(), 8080);
        assert_eq!(parse_env_u64("NONEXISTENT_TTL_VAR", 120).unwrap(), 120);
    }
}
