//! Database models for resources.

use crate::types::{ResourceId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a resource
#[derive(Debug, Clone)]
pub struct ResourceCreateDBRequest {
    pub owner_id: UserId,
    pub name: String,
}

/// Database response for a resource
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResourceDBResponse {
    pub id: ResourceId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}
