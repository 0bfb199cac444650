//! Common type definitions and permission vocabulary.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: account identifier
//! - [`ResourceId`]: owned resource identifier
//! - [`OptionsId`]: account options row identifier
//!
//! # Permission Vocabulary
//!
//! - [`Resource`]: what entity type is being accessed
//! - [`Operation`]: what action is being performed
//! - [`Permission`]: the requirement that a denied caller failed to meet
//!
//! Operations come in two flavors:
//! - **All**: unrestricted access to every row (staff only)
//! - **Own**: restricted to rows owned by the caller

use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type ResourceId = Uuid;
pub type OptionsId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// *-All means unrestricted access, *-Own means restricted to own rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    AccountOptions,
    Resources,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Logical combinators
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Users => write!(f, "users"),
            Resource::AccountOptions => write!(f, "account options"),
            Resource::Resources => write!(f, "resources"),
        }
    }
}
