//! Authentication configuration.
//!
//! [`AuthSettings`] is what the config file holds. At start-up it is combined
//! with an [`EnvSnapshot`] of the process environment into an immutable
//! [`AuthConfig`]; nothing reads the environment after that.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::access::{RouteSettings, RouteTable, RouteTableError};

const INSECURE_PLACEHOLDER_SECRET: &str = "dev-secret-change-in-production";
const MIN_SECRET_LENGTH: usize = 32;
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Authentication settings as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Deployment environment. Production enables secure cookies and CSRF checks.
    pub environment: Environment,

    /// JWT signing secret. Supports `env:VAR_NAME`. `AUTH_SECRET` and
    /// `NEXTAUTH_SECRET` take precedence when set.
    pub jwt_secret: Option<String>,

    /// Public base URL of the application. `APP_URL` is equivalent.
    pub public_url: Option<String>,

    /// Verbose auth logging. `AUTH_DEBUG=true` is equivalent.
    pub debug: bool,

    /// Maximum age of role/status in a token before it is re-read.
    pub refresh_interval_secs: u64,

    /// Deadline for the user store read during a refresh.
    pub refresh_timeout_ms: u64,

    /// Absolute session lifetime.
    pub session_max_age_secs: i64,

    /// Age after which a verified session token is re-issued.
    pub session_update_age_secs: i64,

    /// Upstream identity providers trusted for delegated sign-in.
    pub delegated_providers: Vec<String>,

    /// Per-tier route prefixes.
    pub routes: RouteSettings,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            jwt_secret: None,
            public_url: None,
            debug: false,
            refresh_interval_secs: 300,
            refresh_timeout_ms: 1500,
            session_max_age_secs: 30 * 24 * 60 * 60,
            session_update_age_secs: 24 * 60 * 60,
            delegated_providers: vec!["google".to_string()],
            routes: RouteSettings::default(),
        }
    }
}

/// Immutable copy of the process environment taken at start-up.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, treating empty values as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Resolved authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    pub jwt_secret: String,
    /// Whether `jwt_secret` was generated because none was configured.
    pub secret_is_ephemeral: bool,
    pub base_url: String,
    pub debug: bool,
    pub refresh_interval: Duration,
    pub refresh_timeout: Duration,
    pub session_max_age_secs: i64,
    pub session_update_age_secs: i64,
    pub delegated_providers: Vec<String>,
    pub routes: RouteTable,
}

impl AuthConfig {
    /// Combine file settings with the environment snapshot and validate.
    pub fn resolve(settings: &AuthSettings, env: &EnvSnapshot) -> Result<Self, ConfigValidationError> {
        let production = settings.environment == Environment::Production;

        let (jwt_secret, secret_is_ephemeral) = match resolve_jwt_secret(settings, env)? {
            Some(secret) => (secret, false),
            None if production => return Err(ConfigValidationError::MissingJwtSecret),
            None => (Self::generate_jwt_secret(), true),
        };

        if production {
            if jwt_secret == INSECURE_PLACEHOLDER_SECRET {
                return Err(ConfigValidationError::InsecureJwtSecret);
            }
            if jwt_secret.len() < MIN_SECRET_LENGTH {
                return Err(ConfigValidationError::JwtSecretTooShort);
            }
        }

        let base_url = resolve_base_url(settings, env);
        if Url::parse(&base_url).is_err() {
            return Err(ConfigValidationError::InvalidBaseUrl(base_url));
        }

        let routes =
            RouteTable::from_settings(&settings.routes).map_err(ConfigValidationError::Routes)?;

        let debug = settings.debug || env.get("AUTH_DEBUG").is_some_and(|v| v == "true");

        Ok(Self {
            environment: settings.environment,
            jwt_secret,
            secret_is_ephemeral,
            base_url,
            debug,
            refresh_interval: Duration::from_secs(settings.refresh_interval_secs),
            refresh_timeout: Duration::from_millis(settings.refresh_timeout_ms),
            session_max_age_secs: settings.session_max_age_secs,
            session_update_age_secs: settings.session_update_age_secs,
            delegated_providers: settings.delegated_providers.clone(),
            routes,
        })
    }

    /// Configuration suitable for tests and local runs.
    pub fn development(secret: impl Into<String>) -> Self {
        let settings = AuthSettings::default();
        Self {
            environment: Environment::Development,
            jwt_secret: secret.into(),
            secret_is_ephemeral: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
            refresh_interval: Duration::from_secs(settings.refresh_interval_secs),
            refresh_timeout: Duration::from_millis(settings.refresh_timeout_ms),
            session_max_age_secs: settings.session_max_age_secs,
            session_update_age_secs: settings.session_update_age_secs,
            delegated_providers: settings.delegated_providers,
            routes: RouteTable::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether the base URL points at the local machine.
    pub fn is_localhost(&self) -> bool {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"))
    }

    /// Secure cookies are used only for production deployments on a real host.
    pub fn use_secure_cookies(&self) -> bool {
        self.is_production() && !self.is_localhost()
    }

    /// Generate a random 64 character alphanumeric secret.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }
}

fn resolve_jwt_secret(
    settings: &AuthSettings,
    env: &EnvSnapshot,
) -> Result<Option<String>, ConfigValidationError> {
    if let Some(secret) = env.get("AUTH_SECRET").or_else(|| env.get("NEXTAUTH_SECRET")) {
        return Ok(Some(secret.to_string()));
    }

    match settings.jwt_secret.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => match value.strip_prefix("env:") {
            Some(var_name) => match env.vars.get(var_name) {
                Some(secret) if !secret.is_empty() => Ok(Some(secret.clone())),
                Some(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                None => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
            },
            None => Ok(Some(value.to_string())),
        },
    }
}

fn resolve_base_url(settings: &AuthSettings, env: &EnvSnapshot) -> String {
    let explicit = settings
        .public_url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| env.get("APP_URL").map(str::to_string));

    let url = explicit
        .or_else(|| env.get("VERCEL_URL").map(|host| format!("https://{host}")))
        .or_else(|| env.get("AUTH_URL").map(str::to_string))
        .or_else(|| env.get("NEXTAUTH_URL").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    url.trim_end_matches('/').to_string()
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// JWT secret is required in production.
    MissingJwtSecret,
    /// JWT secret is the insecure placeholder value.
    InsecureJwtSecret,
    /// JWT secret is shorter than 32 characters.
    JwtSecretTooShort,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
    /// The resolved base URL does not parse.
    InvalidBaseUrl(String),
    /// The route table is inconsistent.
    Routes(RouteTableError),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => write!(
                f,
                "JWT secret is required in production. Set AUTH_SECRET or auth.jwt_secret in config."
            ),
            Self::InsecureJwtSecret => write!(
                f,
                "JWT secret cannot be the default insecure value in production. Please configure a secure secret."
            ),
            Self::JwtSecretTooShort => write!(
                f,
                "JWT secret must be at least {} characters long in production.",
                MIN_SECRET_LENGTH
            ),
            Self::EnvVarNotFound(var) => write!(
                f,
                "Environment variable '{}' not found (referenced via env:{} in config).",
                var, var
            ),
            Self::EnvVarEmpty(var) => write!(
                f,
                "Environment variable '{}' is empty (referenced via env:{} in config).",
                var, var
            ),
            Self::InvalidBaseUrl(url) => write!(f, "Base URL '{}' is not a valid URL.", url),
            Self::Routes(err) => write!(f, "Invalid route table: {}", err),
        }
    }
}

impl std::error::Error for ConfigValidationError {}
