//! API request/response models for accounts and their options.

use super::pagination::Pagination;
use super::validation::{FieldValidator, MAX_FIRST_NAME_LENGTH, MAX_LAST_NAME_LENGTH};
use crate::db::models::{account_options::OptionsDBResponse, accounts::AccountDBResponse};
use crate::errors::Result;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// The authenticated caller, resolved from the bearer token on every request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub is_staff: bool,
}

impl From<AccountDBResponse> for CurrentUser {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            is_staff: db.is_staff,
        }
    }
}

/// Staff-only account creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// Profile update for `/users/me`. Any other field in the body is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut validator = FieldValidator::default();
        if let Some(first_name) = &self.first_name {
            validator.max_chars("first_name", first_name, MAX_FIRST_NAME_LENGTH);
        }
        if let Some(last_name) = &self.last_name {
            validator.max_chars("last_name", last_name, MAX_LAST_NAME_LENGTH);
        }
        validator.finish()
    }
}

/// Account as seen by staff
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

impl From<AccountDBResponse> for UserResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            is_staff: db.is_staff,
        }
    }
}

/// The caller's own profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<AccountDBResponse> for ProfileResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
        }
    }
}

/// Quota update. `user_id` and any other field in the body are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OptionsUpdate {
    /// Absent = no change, `null` = unlimited, number = new quota
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<i64>, minimum = 0)]
    pub quota: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionsResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// `null` means unlimited
    pub quota: Option<i64>,
}

impl From<OptionsDBResponse> for OptionsResponse {
    fn from(db: OptionsDBResponse) -> Self {
        Self {
            user_id: db.account_id,
            quota: db.quota,
        }
    }
}

/// Query parameters for listing accounts
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
