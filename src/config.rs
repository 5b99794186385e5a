//! Provider configuration.
//!
//! The provider block names the API host and one of two credential pairs.
//! Every field falls back to a `TAIKUN_*` environment variable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::attributes::AttributeBag;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::{validate, Validator};

/// API host used when neither configuration nor environment names one.
pub const DEFAULT_API_HOST: &str = "api.taikun.cloud";

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "api_host",
            Attribute::optional_string()
                .with_env_default(&["TAIKUN_API_HOST"])
                .with_default(serde_json::json!(DEFAULT_API_HOST))
                .with_description("Custom API host. Can be set with TAIKUN_API_HOST."),
        )
        .with_attribute(
            "email",
            Attribute::optional_string()
                .with_env_default(&["TAIKUN_EMAIL"])
                .with_validator(Validator::Email)
                .with_description("Login email. Can be set with TAIKUN_EMAIL."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(&["TAIKUN_PASSWORD"])
                .with_description("Login password. Can be set with TAIKUN_PASSWORD."),
        )
        .with_attribute(
            "access_key",
            Attribute::optional_string()
                .with_env_default(&["TAIKUN_ACCESS_KEY"])
                .with_description("Access key. Can be set with TAIKUN_ACCESS_KEY."),
        )
        .with_attribute(
            "secret_key",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(&["TAIKUN_SECRET_KEY"])
                .with_description("Secret key. Can be set with TAIKUN_SECRET_KEY."),
        )
}

/// How the client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Email and password login.
    Password {
        /// Login email.
        email: String,
        /// Login password.
        password: String,
    },
    /// Access key and secret key login.
    AccessKey {
        /// Access key.
        access_key: String,
        /// Secret key.
        secret_key: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"***")
                .finish(),
            Self::AccessKey { access_key, .. } => f
                .debug_struct("AccessKey")
                .field("access_key", access_key)
                .field("secret_key", &"***")
                .finish(),
        }
    }
}

/// Backoff of the post-write read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First delay.
    pub initial_interval: Duration,
    /// Delay ceiling.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_interval
            .checked_mul(factor)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }
}

/// Raw provider block after defaults.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API host, with or without scheme.
    #[serde(default)]
    pub api_host: Option<String>,
    /// Login email.
    #[serde(default)]
    pub email: Option<String>,
    /// Login password.
    #[serde(default)]
    pub password: Option<String>,
    /// Access key.
    #[serde(default)]
    pub access_key: Option<String>,
    /// Secret key.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_host", &self.api_host)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ProviderConfig {
    /// Build from the host's provider block, filling gaps from `env`.
    pub fn from_value<F>(value: serde_json::Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let schema = provider_config_schema();
        let mut bag = AttributeBag::from_value(value)?;
        bag.apply_defaults(&schema, env);
        let value = bag.into_value();
        let diagnostics = validate(&schema, &value);
        if !diagnostics.is_empty() {
            return Err(ProviderError::InvalidAttributes(diagnostics));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Build from the host's provider block and the process environment.
    pub fn from_env(value: serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value(value, |var| std::env::var(var).ok())
    }

    /// Base URL, with `https://` added when the host has no scheme.
    pub fn base_url(&self) -> String {
        let host = self
            .api_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_API_HOST)
            .trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    /// The credential pair to log in with. Access keys win over email/password.
    pub fn credentials(&self) -> Result<Credentials, ProviderError> {
        let non_empty =
            |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        match (
            non_empty(&self.access_key),
            non_empty(&self.secret_key),
            non_empty(&self.email),
            non_empty(&self.password),
        ) {
            (Some(access_key), Some(secret_key), _, _) => Ok(Credentials::AccessKey {
                access_key,
                secret_key,
            }),
            (_, _, Some(email), Some(password)) => Ok(Credentials::Password { email, password }),
            _ => Err(ProviderError::Configuration(
                "set either access_key and secret_key, or email and password".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_and_env_fallback() {
        let config = ProviderConfig::from_value(
            json!({}),
            env(&[("TAIKUN_EMAIL", "ops@example.com"), ("TAIKUN_PASSWORD", "pw")]),
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://api.taikun.cloud");
        assert_eq!(
            config.credentials().unwrap(),
            Credentials::Password {
                email: "ops@example.com".to_string(),
                password: "pw".to_string()
            }
        );
    }

    #[test]
    fn test_block_wins_over_env() {
        let config = ProviderConfig::from_value(
            json!({"api_host": "http://localhost:8080/", "access_key": "ak", "secret_key": "sk"}),
            env(&[("TAIKUN_API_HOST", "ignored.example.com")]),
        )
        .unwrap();
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert!(matches!(config.credentials().unwrap(), Credentials::AccessKey { .. }));
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let config =
            ProviderConfig::from_value(json!({"email": "ops@example.com"}), env(&[])).unwrap();
        assert!(matches!(
            config.credentials(),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let err = ProviderConfig::from_value(json!({"email": "nope"}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidAttributes(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProviderConfig {
            password: Some("hunter2".to_string()),
            secret_key: Some("sk-123".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-123"));

        let creds = Credentials::Password {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(10));
        assert_eq!(policy.delay(40), Duration::from_secs(10));
    }
}
