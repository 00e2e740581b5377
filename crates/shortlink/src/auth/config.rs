//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Longest accepted session lifetime, one year.
pub const MAX_JWT_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret for HS256 session tokens. Supports `env:VAR_NAME`.
    pub jwt_secret: Option<String>,

    /// Session lifetime in seconds.
    pub jwt_ttl_secs: u64,

    /// How long a login attempt may stay pending before its state is dropped.
    pub state_ttl_secs: u64,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Add the `Secure` attribute to the session cookie.
    pub secure_cookie: bool,

    /// Externally visible base URL of this service, used for the OAuth redirect URI.
    pub public_url: String,

    /// Path of the OAuth callback endpoint.
    pub callback_path: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret. Supports `env:VAR_NAME`.
    pub client_secret: String,

    /// Identity provider endpoints.
    pub provider: ProviderConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default secret - must be explicitly configured
            jwt_secret: None,
            jwt_ttl_secs: 60 * 60 * 24,
            state_ttl_secs: 10 * 60,
            cookie_name: "token".to_string(),
            secure_cookie: false,
            public_url: "http://localhost:8080".to_string(),
            callback_path: "/auth/callback".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            provider: ProviderConfig::default(),
        }
    }
}

/// OAuth2 identity provider endpoints. Defaults point at Google.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    /// Timeout for each request to the provider, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v1/userinfo".to_string(),
            scopes: vec!["email".to_string()],
            timeout_secs: 10,
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => resolve_env(value).map(Some),
        }
    }

    /// Resolve the OAuth client secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_client_secret(&self) -> Result<String, ConfigValidationError> {
        resolve_env(&self.client_secret)
    }

    /// Full redirect URI registered with the provider.
    pub fn redirect_url(&self) -> String {
        format!(
            "{}{}",
            self.public_url.trim_end_matches('/'),
            self.callback_path
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let secret = self
            .resolve_jwt_secret()?
            .ok_or(ConfigValidationError::MissingJwtSecret)?;
        if secret.len() < 32 {
            return Err(ConfigValidationError::JwtSecretTooShort);
        }

        if self.client_id.is_empty() {
            return Err(ConfigValidationError::MissingClientId);
        }
        self.resolve_client_secret()?;

        if self.jwt_ttl_secs == 0 || self.state_ttl_secs == 0 {
            return Err(ConfigValidationError::ZeroTtl);
        }
        if self.jwt_ttl_secs > MAX_JWT_TTL_SECS {
            return Err(ConfigValidationError::TtlTooLong(self.jwt_ttl_secs));
        }

        if !self.callback_path.starts_with('/') {
            return Err(ConfigValidationError::InvalidCallbackPath(
                self.callback_path.clone(),
            ));
        }

        Ok(())
    }
}

fn resolve_env(value: &str) -> Result<String, ConfigValidationError> {
    let Some(var_name) = value.strip_prefix("env:") else {
        return Ok(value.to_string());
    };
    match std::env::var(var_name) {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// JWT secret is required.
    MissingJwtSecret,
    /// JWT secret is too short (minimum 32 characters).
    JwtSecretTooShort,
    /// OAuth client ID is required.
    MissingClientId,
    /// A TTL was configured as zero.
    ZeroTtl,
    /// Session lifetime exceeds [`MAX_JWT_TTL_SECS`].
    TtlTooLong(u64),
    /// Callback path must be absolute.
    InvalidCallbackPath(String),
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => write!(
                f,
                "JWT secret is required. Set auth.jwt_secret in config or SHORTLINK__AUTH__JWT_SECRET."
            ),
            Self::JwtSecretTooShort => {
                write!(f, "JWT secret must be at least 32 characters long.")
            }
            Self::MissingClientId => write!(f, "auth.client_id is required."),
            Self::ZeroTtl => write!(f, "auth.jwt_ttl_secs and auth.state_ttl_secs must be > 0."),
            Self::TtlTooLong(secs) => write!(
                f,
                "auth.jwt_ttl_secs must be at most {MAX_JWT_TTL_SECS}, got {secs}."
            ),
            Self::InvalidCallbackPath(path) => {
                write!(f, "auth.callback_path must start with '/': {path:?}")
            }
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
        }
    }
}

impl std::error::Error for ConfigValidationError {}
