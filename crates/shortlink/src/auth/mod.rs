//! Authentication module.
//!
//! Browser sessions are established through an OAuth2 authorization-code
//! login and carried in a signed cookie:
//! - pending logins are tracked by single-use anti-forgery state tokens
//! - a verified provider identity is turned into an HS256 session token
//! - protected routes sit behind [`require_session`]

mod authenticator;
mod config;
mod credential;
mod csrf;
mod error;
mod middleware;
mod provider;

pub use authenticator::{CompletedLogin, SessionAuthenticator, SessionCookie, SessionGate};
pub use config::{AuthConfig, ConfigValidationError, ProviderConfig};
pub use credential::{SessionClaims, SessionCredentials};
pub use csrf::CsrfStateStore;
pub use error::AuthError;
pub use middleware::{CurrentUser, oauth_callback, require_session};
pub use provider::{IdentityProvider, OAuthProvider, ProviderError, ProviderIdentity};

pub(crate) use middleware::found;
