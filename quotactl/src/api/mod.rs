//! REST API layer.
//!
//! - **[`handlers`]**: axum route handlers
//! - **[`models`]**: request/response types
//! - **[`json`]**: the JSON body extractor every handler uses
//!
//! Every route lives under `/api/v1`:
//!
//! - **Authentication** (`/auth/*`): registration and login, both returning a token pair
//! - **Users** (`/users/*`): the caller's profile, plus staff-only account and quota management
//! - **Resources** (`/resources/*`): quota-limited resources owned by accounts
//!
//! All handlers carry `utoipa` annotations; see [`crate::openapi`].

pub mod handlers;
pub mod json;
pub mod models;
