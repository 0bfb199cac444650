//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL, following the
//! Repository pattern.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, quota guard)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a connection, so several of them can share one transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let options = AccountOptions::new(&mut tx).lock_for_account(owner).await?;
//! let count = Resources::new(&mut tx).count_for_owner(owner).await?;
//! tx.commit().await?;
//! ```
//!
//! Migrations live in `migrations/` and are applied through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
