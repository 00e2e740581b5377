//! Session gate middleware and the OAuth callback handler.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{
        StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::debug;

use super::{AuthError, SessionAuthenticator, SessionGate};

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Verified email of the session subject.
    pub email: String,
}

impl CurrentUser {
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Session middleware.
///
/// Requests carrying a valid session cookie continue with `CurrentUser` in
/// their extensions. Everything else is redirected to the identity provider
/// and returns to the requested path after login.
pub async fn require_session(
    State(auth): State<Arc<SessionAuthenticator>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let cookie_headers = req
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok());

    match auth.require_session(cookie_headers, req.uri().path()) {
        SessionGate::Pass(email) => {
            req.extensions_mut().insert(CurrentUser { email });
            next.run(req).await
        }
        SessionGate::Challenge(login_url) => {
            debug!("no valid session for {}, starting login", req.uri().path());
            found(&login_url)
        }
    }
}

/// `GET <callback_path>?state=..&code=..`
pub async fn oauth_callback(
    State(auth): State<Arc<SessionAuthenticator>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AuthError> {
    let state = single_param(&params, "state")?;
    let code = single_param(&params, "code")?;

    let login = auth.complete_authorization(state, code).await?;

    Ok((
        StatusCode::FOUND,
        [
            (SET_COOKIE, login.cookie.header_value()),
            (LOCATION, login.redirect_to),
        ],
    )
        .into_response())
}

fn single_param<'a>(params: &'a [(String, String)], name: &str) -> Result<&'a str, AuthError> {
    let mut values = params.iter().filter(|(k, _)| k == name).map(|(_, v)| v);
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        (None, _) => Err(AuthError::BadRequest(format!("missing {name} parameter"))),
        (Some(_), Some(_)) => Err(AuthError::BadRequest(format!(
            "expected exactly one {name} parameter"
        ))),
    }
}

/// 302 Found to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
