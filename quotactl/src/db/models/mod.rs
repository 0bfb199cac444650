//! Database record models matching table schemas.
//!
//! Database models are distinct from API models so storage and API representations
//! can evolve independently. Request structs carry already-validated values; response
//! structs derive `sqlx::FromRow` and map one table row each.
//!
//! - [`accounts`]: account identity and credentials
//! - [`account_options`]: the one-to-one options row holding the quota
//! - [`resources`]: quota-limited resources owned by an account

pub mod account_options;
pub mod accounts;
pub mod resources;
