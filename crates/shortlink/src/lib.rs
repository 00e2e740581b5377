//! Shortlink library
//!
//! Link redirection service whose management endpoints sit behind an OAuth
//! login with signed session cookies.

pub mod api;
pub mod auth;
pub mod db;
pub mod store;
