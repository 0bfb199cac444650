//! Database models for accounts.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new account together with its options row
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    /// Initial quota stored on the options row (`None` = unlimited)
    pub quota: Option<i64>,
}

/// Database request for updating an account profile
#[derive(Debug, Clone, Default)]
pub struct AccountUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountDBResponse {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
