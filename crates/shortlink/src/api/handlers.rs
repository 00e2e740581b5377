//! HTTP handlers.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{CurrentUser, found};
use crate::store::Link;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /`
pub async fn resolve_root(State(state): State<AppState>) -> Response {
    resolve(&state, "").await
}

/// `GET /{*key}`
pub async fn resolve_link(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    resolve(&state, &key).await
}

#[instrument(skip(state))]
async fn resolve(state: &AppState, key: &str) -> Response {
    match state.store.get(key).await {
        Ok(Some(link)) => return found(&link.value),
        Ok(None) => debug!("no link under key"),
        Err(e) => error!("lookup failed: {}", e),
    }
    match state.default_redirect_url.as_deref() {
        Some(url) => found(url),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Store membership of the calling user.
#[derive(Debug, Clone, Copy)]
struct Membership {
    user: bool,
    admin: bool,
}

impl Membership {
    async fn of(state: &AppState, who: &CurrentUser) -> ApiResult<Self> {
        Ok(Self {
            user: state.store.is_user(who.email()).await?,
            admin: state.store.is_admin(who.email()).await?,
        })
    }

    fn require_member(self, who: &CurrentUser) -> ApiResult<Self> {
        if self.user || self.admin {
            Ok(self)
        } else {
            Err(ApiError::forbidden(format!(
                "user {:?} not whitelisted for operation",
                who.email()
            )))
        }
    }

    fn require_admin(self, who: &CurrentUser) -> ApiResult<Self> {
        if self.admin {
            Ok(self)
        } else {
            Err(ApiError::forbidden(format!(
                "user {:?} not whitelisted for operation",
                who.email()
            )))
        }
    }
}

/// Link shown in the editor.
#[derive(Debug, Serialize)]
pub struct EditLinkResponse {
    pub key: String,
    pub value: String,
}

/// `GET /admin/edit?key=K`
///
/// The value is left empty when `key` is absent, repeated or unreadable.
#[instrument(skip_all, fields(user = %user.email))]
pub async fn get_edit_link(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<EditLinkResponse>> {
    Membership::of(&state, &user).await?.require_member(&user)?;

    let mut keys = params.into_iter().filter(|(k, _)| k == "key").map(|(_, v)| v);
    let key = match (keys.next(), keys.next()) {
        (Some(key), None) => key,
        _ => String::new(),
    };

    let value = if key.is_empty() {
        String::new()
    } else {
        match state.store.get(&key).await {
            Ok(Some(link)) => link.value,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("cannot read link for editing: {}", e);
                String::new()
            }
        }
    };

    Ok(Json(EditLinkResponse { key, value }))
}

/// Form posted by the editor.
#[derive(Debug, Deserialize)]
pub struct EditLinkForm {
    #[serde(default)]
    pub key: String,
    /// Target URL; empty deletes the link.
    #[serde(default, alias = "link")]
    pub value: String,
}

/// `POST /admin/edit`
#[instrument(skip_all, fields(user = %user.email, key = %form.key))]
pub async fn post_edit_link(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<EditLinkForm>,
) -> ApiResult<Response> {
    let membership = Membership::of(&state, &user).await?.require_member(&user)?;

    let value = form.value.trim();
    if value.is_empty() {
        state
            .store
            .delete(&form.key, user.email(), membership.admin)
            .await?;
        info!("link deleted");
    } else {
        let target = normalize_target(value)?;
        state
            .store
            .put(&form.key, &target, user.email(), membership.admin)
            .await?;
        info!("link saved");
    }

    Ok(found("/admin/list"))
}

/// `GET /admin/list`: the caller's links, or every link for admins.
#[instrument(skip_all, fields(user = %user.email))]
pub async fn list_links(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Link>>> {
    let membership = Membership::of(&state, &user).await?.require_member(&user)?;
    let links = state.store.list(user.email(), membership.admin).await?;
    Ok(Json(links))
}

/// `GET /admin/users`
#[instrument(skip_all, fields(user = %user.email))]
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<String>>> {
    Membership::of(&state, &user).await?.require_admin(&user)?;
    Ok(Json(state.store.list_users().await?))
}

/// Membership change requested from the user list.
#[derive(Debug, Deserialize)]
pub struct EditUserForm {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAction {
    Create,
    Delete,
    DeleteWithLinks,
}

impl UserAction {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "CREATE" => Some(Self::Create),
            "DELETE" => Some(Self::Delete),
            "DELETE_WITH_LINKS" => Some(Self::DeleteWithLinks),
            _ => None,
        }
    }
}

/// `POST /admin/users`
#[instrument(skip_all, fields(user = %user.email, target = %form.user))]
pub async fn post_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<EditUserForm>,
) -> ApiResult<Response> {
    Membership::of(&state, &user).await?.require_admin(&user)?;

    let action = UserAction::parse(&form.action)
        .ok_or_else(|| ApiError::bad_request(format!("unknown action {:?}", form.action)))?;
    let target = form.user.trim();
    if target.is_empty() {
        return Err(ApiError::bad_request("user must not be empty"));
    }

    match action {
        UserAction::Create => state.store.add_user(target).await?,
        UserAction::Delete => state.store.delete_user(target, true).await?,
        UserAction::DeleteWithLinks => state.store.delete_user(target, false).await?,
    }
    info!("applied {:?}", action);

    Ok(found("/admin/users"))
}

/// Turn user input into an absolute URL, assuming `http` when no scheme is given.
///
/// Control characters are rejected since URL parsing strips some of them and
/// the stored value has to fit a `Location` header.
fn normalize_target(raw: &str) -> ApiResult<String> {
    if raw.chars().any(char::is_control) {
        return Err(ApiError::bad_request(format!(
            "invalid link {raw:?}: control characters are not allowed"
        )));
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    Url::parse(&candidate)
        .map_err(|e| ApiError::bad_request(format!("invalid link {raw:?}: {e}")))?;
    Ok(candidate)
}
