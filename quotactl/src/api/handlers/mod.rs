//! HTTP request handlers.
//!
//! Each handler validates its input, authenticates the caller through the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor (or
//! [`RequiresPermission`](crate::auth::permissions::RequiresPermission) for staff-only
//! routes), runs its queries through the repositories in [`crate::db::handlers`], and returns
//! `Result<_, Error>` so failures render as JSON error bodies.
//!
//! - [`auth`]: registration and login
//! - [`users`]: own profile, staff-side account management and quota options
//! - [`resources`]: owned resources, with creation gated by the quota guard

pub mod auth;
pub mod resources;
pub mod users;
