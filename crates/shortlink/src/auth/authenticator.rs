//! Login flow orchestration: state tracking, code exchange and session issuance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::config::{AuthConfig, ConfigValidationError};
use super::credential::SessionCredentials;
use super::csrf::CsrfStateStore;
use super::provider::IdentityProvider;
use super::AuthError;

/// Session cookie to hand back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: DateTime<Utc>,
    pub secure: bool,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut value = format!(
            "{}={}; Path={}; Expires={}; HttpOnly; SameSite=Lax",
            self.name,
            self.value,
            self.path,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        );
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    /// Verified subject.
    pub subject: String,
    pub cookie: SessionCookie,
    /// Where to send the browser next.
    pub redirect_to: String,
}

/// Outcome of the session gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGate {
    /// Valid session for this subject.
    Pass(String),
    /// No usable session: send the browser to this login URL.
    Challenge(String),
}

/// Drives the authorization-code login and verifies session cookies.
pub struct SessionAuthenticator {
    states: Arc<CsrfStateStore>,
    credentials: SessionCredentials,
    provider: Arc<dyn IdentityProvider>,
    cookie_name: String,
    secure_cookie: bool,
}

impl SessionAuthenticator {
    pub fn new(
        states: Arc<CsrfStateStore>,
        credentials: SessionCredentials,
        provider: Arc<dyn IdentityProvider>,
        cookie_name: impl Into<String>,
        secure_cookie: bool,
    ) -> Self {
        Self {
            states,
            credentials,
            provider,
            cookie_name: cookie_name.into(),
            secure_cookie,
        }
    }

    /// Build from validated configuration.
    pub fn from_config(
        config: &AuthConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        let secret = config
            .resolve_jwt_secret()?
            .ok_or(ConfigValidationError::MissingJwtSecret)?;

        Ok(Self::new(
            Arc::new(CsrfStateStore::new(Duration::from_secs(config.state_ttl_secs))),
            SessionCredentials::new(secret.as_bytes(), Duration::from_secs(config.jwt_ttl_secs)),
            provider,
            config.cookie_name.clone(),
            config.secure_cookie,
        ))
    }

    /// Pending login attempts.
    pub fn states(&self) -> &Arc<CsrfStateStore> {
        &self.states
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Start a login that returns to `originating_path`; returns the provider URL.
    pub fn begin_authorization(&self, originating_path: &str) -> String {
        let state = self.states.begin(originating_path);
        self.provider.authorize_url(&state)
    }

    /// Finish a login from the provider callback.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<CompletedLogin, AuthError> {
        let originating_path = self.states.complete(state).ok_or_else(|| {
            warn!("OAuth callback with unknown or reused state");
            AuthError::Csrf
        })?;

        let access_token = self.provider.exchange_code(code).await.map_err(|e| {
            warn!("failed to exchange code for token: {}", e);
            AuthError::Upstream(format!("failed to exchange code for token: {e}"))
        })?;

        let identity = self
            .provider
            .fetch_identity(&access_token)
            .await
            .map_err(|e| {
                warn!("failed to fetch userinfo: {}", e);
                AuthError::Upstream(format!("failed to fetch userinfo: {e}"))
            })?;

        if !identity.verified {
            warn!("provider reported unverified email {}", identity.email);
            return Err(AuthError::UnverifiedIdentity);
        }

        let (token, expires) = self.credentials.build(&identity.email)?;

        info!("user {} logged in", identity.email);
        Ok(CompletedLogin {
            cookie: SessionCookie {
                name: self.cookie_name.clone(),
                value: token,
                path: "/".to_string(),
                expires,
                secure: self.secure_cookie,
            },
            subject: identity.email,
            redirect_to: local_redirect_target(&originating_path),
        })
    }

    /// Check the session cookie among `cookie_headers`.
    ///
    /// Only the first cookie carrying the session name is considered. Without
    /// a valid one a new login is started that returns to `current_path`.
    pub fn require_session<'a, I>(&self, cookie_headers: I, current_path: &str) -> SessionGate
    where
        I: IntoIterator<Item = &'a str>,
    {
        let token = cookie_headers
            .into_iter()
            .find_map(|header| cookie_value(header, &self.cookie_name));

        match token.and_then(|t| self.credentials.verify(t)) {
            Some(subject) => SessionGate::Pass(subject),
            None => SessionGate::Challenge(self.begin_authorization(current_path)),
        }
    }
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("cookie_name", &self.cookie_name)
            .field("pending_logins", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Extract a cookie value from a `Cookie` header.
pub(crate) fn cookie_value<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Only same-origin absolute paths are honoured as post-login targets.
fn local_redirect_target(path: &str) -> String {
    if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") {
        path.to_string()
    } else {
        "/".to_string()
    }
}
