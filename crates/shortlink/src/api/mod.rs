//! HTTP API module.
//!
//! Public link lookups, the OAuth callback and the session-gated
//! management endpoints.

mod error;
pub mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
