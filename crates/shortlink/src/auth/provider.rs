//! OAuth2 identity provider client.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use super::config::AuthConfig;

/// Identity reported by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderIdentity {
    #[serde(default)]
    pub email: String,
    /// Missing flag counts as unverified.
    #[serde(default, rename = "verified_email", alias = "email_verified")]
    pub verified: bool,
}

/// Errors talking to the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to identity provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("identity provider response missing {0}")]
    Missing(&'static str),
}

/// The external party that turns an authorization code into a verified identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to in order to log in.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError>;

    /// Fetch the identity behind an access token.
    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Authorization-code flow against a standard OAuth2 provider (Google by default).
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    client: reqwest::Client,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    scope: String,
}

impl OAuthProvider {
    /// Build a provider client from configuration. `client_secret` must
    /// already be resolved.
    pub fn new(config: &AuthConfig, client_secret: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            auth_url: parse_url(&config.provider.auth_url)?,
            token_url: parse_url(&config.provider.token_url)?,
            userinfo_url: parse_url(&config.provider.userinfo_url)?,
            client_id: config.client_id.clone(),
            client_secret,
            redirect_url: config.redirect_url(),
            scope: config.provider.scopes.join(" "),
        })
    }
}

fn parse_url(url: &str) -> Result<Url, ProviderError> {
    Url::parse(url).map_err(|e| ProviderError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!("identity provider returned {}: {}", status, body);
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = check_status(resp).await?.json().await?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Missing("access_token"));
        }
        Ok(token.access_token)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let resp = self
            .client
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let identity: ProviderIdentity = check_status(resp).await?.json().await?;
        if identity.email.is_empty() {
            return Err(ProviderError::Missing("email"));
        }
        Ok(identity)
    }
}
