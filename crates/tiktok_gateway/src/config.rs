//! Gateway configuration
//!
//! Everything the gateway needs is read from environment variables (a `.env`
//! file is honoured by the binary before this runs). Parsing goes through
//! [`GatewayConfig::from_lookup`] so the rules can be exercised without
//! touching the process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::auth::OAuthConfig;
use crate::platform::PlatformEndpoints;

pub const DEFAULT_AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
pub const DEFAULT_API_BASE: &str = "https://open.tiktokapis.com";
pub const DEFAULT_SCOPES: &str = "user.info.basic";

const MIN_SESSION_SECRET_LEN: usize = 32;
const DEFAULT_SESSION_TTL_MINUTES: u64 = 24 * 60;
const MAX_SESSION_TTL_MINUTES: u64 = 365 * 24 * 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

/// String that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// `APP_ENV=production` turns on secure cookies and host restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Supabase PostgREST connection used by the user registry and listings.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    pub key: Secret,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub oauth: OAuthConfig,
    pub endpoints: PlatformEndpoints,
    pub session_secret: Secret,
    pub session_ttl: Duration,
    pub environment: Environment,
    pub allowed_hosts: Vec<String>,
    pub supabase: Option<SupabaseConfig>,
    pub http_timeout: Duration,
    pub static_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let client_key = require("TIKTOK_CLIENT_KEY")?;
        let client_secret = require("TIKTOK_CLIENT_SECRET")?;
        let redirect_uri: Url = require("TIKTOK_REDIRECT_URI")?
            .parse()
            .map_err(|e| invalid("TIKTOK_REDIRECT_URI", e))?;

        let session_secret = require("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(invalid(
                "SESSION_SECRET",
                format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            ));
        }

        let scopes = split_list(&get("TIKTOK_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()));
        if scopes.is_empty() {
            return Err(invalid("TIKTOK_SCOPES", "no scopes listed"));
        }

        let auth_url: Url = get("TIKTOK_AUTH_URL")
            .as_deref()
            .unwrap_or(DEFAULT_AUTH_URL)
            .parse()
            .map_err(|e| invalid("TIKTOK_AUTH_URL", e))?;
        let api_base: Url = get("TIKTOK_API_BASE")
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .parse()
            .map_err(|e| invalid("TIKTOK_API_BASE", e))?;
        let endpoints = PlatformEndpoints::new(auth_url, &api_base)
            .map_err(|e| invalid("TIKTOK_API_BASE", e))?;

        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };
        let allowed_hosts = get("ALLOWED_HOSTS")
            .map(|hosts| split_list(&hosts))
            .unwrap_or_default();

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url: url.parse().map_err(|e| invalid("SUPABASE_URL", e))?,
                key: Secret::new(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
        };

        let session_ttl_minutes = parse_or("SESSION_TTL_MINUTES", get("SESSION_TTL_MINUTES"), DEFAULT_SESSION_TTL_MINUTES)?;
        if session_ttl_minutes == 0 || session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            return Err(invalid(
                "SESSION_TTL_MINUTES",
                format!("must be between 1 and {MAX_SESSION_TTL_MINUTES}"),
            ));
        }
        let session_ttl_secs = session_ttl_minutes
            .checked_mul(60)
            .ok_or_else(|| invalid("SESSION_TTL_MINUTES", "out of range"))?;
        let http_timeout_secs = parse_or("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err(invalid("HTTP_TIMEOUT_SECS", "must be greater than zero"));
        }
        let port = parse_or("PORT", get("PORT"), 8000u16)?;

        Ok(Self {
            oauth: OAuthConfig {
                client_key,
                client_secret: Secret::new(client_secret),
                redirect_uri,
                scopes,
            },
            endpoints,
            session_secret: Secret::new(session_secret),
            session_ttl: Duration::from_secs(session_ttl_secs),
            environment,
            allowed_hosts,
            supabase,
            http_timeout: Duration::from_secs(http_timeout_secs),
            static_dir: get("STATIC_DIR").unwrap_or_else(|| "static".to_string()).into(),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("TIKTOK_CLIENT_KEY", "awkey".to_string()),
            ("TIKTOK_CLIENT_SECRET", "shh".to_string()),
            ("TIKTOK_REDIRECT_URI", "https://example.com/callback".to_string()),
            ("SESSION_SECRET", "x".repeat(40)),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<GatewayConfig, ConfigError> {
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.oauth.client_key, "awkey");
        assert_eq!(config.oauth.scopes, vec!["user.info.basic".to_string()]);
        assert_eq!(config.endpoints.authorize.as_str(), DEFAULT_AUTH_URL);
        assert_eq!(
            config.endpoints.token.as_str(),
            "https://open.tiktokapis.com/v2/oauth/token/"
        );
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.secure_cookies());
        assert!(config.supabase.is_none());
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_missing_client_secret() {
        let mut env = base_env();
        env.remove("TIKTOK_CLIENT_SECRET");

        assert_eq!(
            load(&env).unwrap_err(),
            ConfigError::Missing("TIKTOK_CLIENT_SECRET")
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("TIKTOK_CLIENT_KEY", "   ".to_string());

        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("TIKTOK_CLIENT_KEY"));
    }

    #[test]
    fn test_short_session_secret_rejected() {
        let mut env = base_env();
        env.insert("SESSION_SECRET", "too-short".to_string());

        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { var: "SESSION_SECRET", .. }
        ));
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let mut env = base_env();
        env.insert("TIKTOK_REDIRECT_URI", "not a url".to_string());

        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { var: "TIKTOK_REDIRECT_URI", .. }
        ));
    }

    #[test]
    fn test_half_configured_supabase_rejected() {
        let mut env = base_env();
        env.insert("SUPABASE_URL", "https://db.example.com".to_string());

        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("SUPABASE_KEY"));
    }

    #[test]
    fn test_production_settings() {
        let mut env = base_env();
        env.insert("APP_ENV", "production".to_string());
        env.insert("ALLOWED_HOSTS", "example.com, www.example.com".to_string());
        env.insert("TIKTOK_SCOPES", "user.info.basic,video.list".to_string());
        env.insert("SUPABASE_URL", "https://db.example.com".to_string());
        env.insert("SUPABASE_KEY", "service-key".to_string());

        let config = load(&env).unwrap();

        assert!(config.secure_cookies());
        assert_eq!(config.allowed_hosts, vec!["example.com", "www.example.com"]);
        assert_eq!(config.oauth.scopes, vec!["user.info.basic", "video.list"]);
        assert_eq!(config.supabase.unwrap().key.expose(), "service-key");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("shh"));
        assert!(rendered.contains("Secret(***)"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut env = base_env();
        env.insert("HTTP_TIMEOUT_SECS", "0".to_string());

        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { var: "HTTP_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn test_session_ttl_bounds() {
        for raw in ["0", "525601", "1000000000000", "18446744073709551615"] {
            let mut env = base_env();
            env.insert("SESSION_TTL_MINUTES", raw.to_string());

            assert!(
                matches!(
                    load(&env).unwrap_err(),
                    ConfigError::Invalid { var: "SESSION_TTL_MINUTES", .. }
                ),
                "{raw} should be rejected"
            );
        }

        let mut env = base_env();
        env.insert("SESSION_TTL_MINUTES", "525600".to_string());
        assert_eq!(
            load(&env).unwrap().session_ttl,
            Duration::from_secs(525_600 * 60)
        );
    }
}
