//! Shared pagination types for API query parameters.
//!
//! List endpoints use offset-based pagination with optional `skip` and `limit` parameters
//! and return plain JSON arrays. Without a `limit` every remaining row is returned.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 1000;

/// Standard pagination parameters for list endpoints.
///
/// The values are parsed with `DisplayFromStr` because query structs that embed this one
/// use `#[serde(flatten)]`, which hands every value over as a string.
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: all)
    #[param(minimum = 1, maximum = 1000)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the skip value, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value clamped between 1 and MAX_LIMIT, or `None` for no limit.
    #[inline]
    pub fn limit(&self) -> Option<i64> {
        self.limit.map(|limit| limit.clamp(1, MAX_LIMIT))
    }
}
