//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pool connection or an open
//! transaction), provides strongly-typed queries for one table, and returns models from
//! [`crate::db::models`].
//!
//! - [`Accounts`]: account identity, credentials and profile
//! - [`AccountOptions`]: per-account options, including the row lock used by the quota guard
//! - [`Resources`]: owned resources and per-owner counts
//!
//! ```ignore
//! use quotactl::db::handlers::{Accounts, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let account = Accounts::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod account_options;
pub mod accounts;
pub mod repository;
pub mod resources;

pub use account_options::AccountOptions;
pub use accounts::Accounts;
pub use repository::Repository;
pub use resources::Resources;
