//! API request/response models for resources.

use super::pagination::Pagination;
use super::validation::{FieldValidator, MAX_RESOURCE_NAME_LENGTH};
use crate::db::models::resources::ResourceDBResponse;
use crate::errors::Result;
use crate::types::{ResourceId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceCreate {
    pub name: String,
    /// Only honoured for staff callers; everyone else always owns what they create
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

impl ResourceCreate {
    /// Limits apply to the trimmed name, which is also what gets stored.
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        let mut validator = FieldValidator::default();
        validator.not_blank("name", name);
        validator.max_chars("name", name, MAX_RESOURCE_NAME_LENGTH);
        validator.finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ResourceId,
    pub name: String,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
}

impl From<ResourceDBResponse> for ResourceResponse {
    fn from(db: ResourceDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            owner_id: db.owner_id,
        }
    }
}

/// Query parameters for listing resources
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListResourcesQuery {
    /// Only return resources owned by this account
    #[param(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,

    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
