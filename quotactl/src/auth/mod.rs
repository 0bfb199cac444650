//! Authentication and authorization.
//!
//! # Authentication
//!
//! Clients obtain an access/refresh token pair from `/api/v1/auth/login` or
//! `/api/v1/auth/register` and send the access token as `Authorization: Bearer <token>`.
//! Tokens are HS256 JWTs signed with `secret_key`; refresh tokens are rejected wherever an
//! access token is expected. The account behind a token is re-read on every request, so a
//! deactivated account stops working immediately.
//!
//! # Authorization
//!
//! Accounts are either staff or regular. Staff may act on every row; regular accounts only on
//! rows they own, and never on account options. See [`permissions`].
//!
//! # Modules
//!
//! - [`current_user`]: the `CurrentUser` extractor
//! - [`password`]: Argon2id hashing and the password policy
//! - [`permissions`]: permission table, ownership checks and list scoping
//! - [`session`]: token issuance and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use quotactl::api::models::users::CurrentUser;
//! use quotactl::auth::permissions::{RequiresPermission, operation, resource};
//!
//! async fn my_profile(current_user: CurrentUser) -> Result<Json<ProfileResponse>> { ... }
//!
//! async fn list_users(
//!     _: RequiresPermission<resource::Users, operation::ReadAll>,
//! ) -> Result<Json<Vec<UserResponse>>> { ... }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
