//! Link storage.
//!
//! Links live in a SQLite key/value layout (`links`, `users`, `admins`).
//! Writes are ownership-checked: only the owner of a link, or an admin
//! acting with override, may replace or delete it.

mod error;
mod models;
mod repository;

pub use error::StoreError;
pub use models::Link;
pub use repository::LinkStore;
