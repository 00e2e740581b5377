//! Test utilities and common setup.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use shortlink::api::{self, AppState};
use shortlink::auth::{
    CsrfStateStore, IdentityProvider, ProviderError, ProviderIdentity, SessionAuthenticator,
    SessionCredentials,
};
use shortlink::db::Database;
use shortlink::store::LinkStore;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";
pub const COOKIE_NAME: &str = "token";
pub const AUTHORIZE_URL: &str = "https://idp.test/authorize";

/// Authorization code that makes the token exchange fail.
pub const FAILING_CODE: &str = "upstream-failure";
/// Prefix of codes that resolve to an unverified identity.
pub const UNVERIFIED_PREFIX: &str = "unverified:";

/// Identity provider double.
///
/// The authorization code doubles as the email the provider vouches for, so
/// tests can log in as anyone. [`FAILING_CODE`] and [`UNVERIFIED_PREFIX`]
/// trigger the failure paths.
pub struct MockProvider;

#[async_trait]
impl IdentityProvider for MockProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("{AUTHORIZE_URL}?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        if code == FAILING_CODE {
            return Err(ProviderError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            });
        }
        Ok(format!("access:{code}"))
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let code = access_token
            .strip_prefix("access:")
            .ok_or(ProviderError::Missing("access token"))?;
        Ok(match code.strip_prefix(UNVERIFIED_PREFIX) {
            Some(email) => ProviderIdentity {
                email: email.to_string(),
                verified: false,
            },
            None => ProviderIdentity {
                email: code.to_string(),
                verified: true,
            },
        })
    }
}

/// Router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub store: LinkStore,
    pub auth: Arc<SessionAuthenticator>,
}

impl TestApp {
    /// Send a request through a clone of the router.
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// `GET uri` with an optional session for `user`.
    pub async fn get(&self, uri: &str, user: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, session_cookie(user));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Form `POST` as `user`.
    pub async fn post_form(&self, uri: &str, user: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, session_cookie(user))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

/// Create a test application on an in-memory database.
pub async fn test_app() -> TestApp {
    test_app_with_default(None).await
}

/// Same as [`test_app`] with a redirect target for unknown keys.
pub async fn test_app_with_default(default_redirect_url: Option<&str>) -> TestApp {
    let db = Database::in_memory().await.unwrap();
    let store = LinkStore::new(db.pool().clone());

    let auth = Arc::new(SessionAuthenticator::new(
        Arc::new(CsrfStateStore::new(Duration::from_secs(600))),
        SessionCredentials::new(TEST_SECRET.as_bytes(), Duration::from_secs(3600)),
        Arc::new(MockProvider),
        COOKIE_NAME,
        false,
    ));

    let state = AppState::new(
        auth.clone(),
        store.clone(),
        default_redirect_url.map(str::to_string),
    );

    TestApp {
        router: api::create_router(state, "/auth/callback"),
        pool: db.pool().clone(),
        store,
        auth,
    }
}

/// `Cookie` header value carrying a valid session for `email`.
pub fn session_cookie(email: &str) -> String {
    let credentials =
        SessionCredentials::new(TEST_SECRET.as_bytes(), Duration::from_secs(3600));
    let (token, _) = credentials.build(email).unwrap();
    format!("{COOKIE_NAME}={token}")
}

/// `Location` header of a response.
pub fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Decode a JSON response body.
pub async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
