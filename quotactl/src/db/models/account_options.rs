//! Database models for account options.

use crate::types::{OptionsId, UserId};
use sqlx::FromRow;

/// Database response for an account options row
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OptionsDBResponse {
    pub id: OptionsId,
    pub account_id: UserId,
    /// Maximum number of resources the account may own (`None` = unlimited)
    pub quota: Option<i64>,
}
