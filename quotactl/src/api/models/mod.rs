//! API request and response data models.
//!
//! These structures define the public JSON contract and are kept separate from the
//! database models in [`crate::db::models`], so storage columns (password hashes,
//! timestamps) never leak into responses by accident.
//!
//! - [`auth`]: registration, login and token payloads
//! - [`users`]: account profiles, staff-side account management, quota options
//! - [`resources`]: owned resources and their list filter
//! - [`pagination`]: `skip`/`limit` query parameters shared by list endpoints
//! - [`validation`]: per-field error collection for request bodies

pub mod auth;
pub mod pagination;
pub mod resources;
pub mod users;
pub mod validation;
