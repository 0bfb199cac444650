//! Permission checks and ownership scoping.
//!
//! Staff accounts hold every permission. Everyone else may only act on rows they own:
//!
//! | Resource          | Non-staff permissions                     |
//! |-------------------|-------------------------------------------|
//! | `Resources`       | create/read/delete own                    |
//! | `Users`           | read/update own profile                   |
//! | `AccountOptions`  | none (not even their own quota)           |
//!
//! Handlers either declare a requirement in their signature with [`RequiresPermission`], or call
//! the functions below once the row being accessed is known.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::{pagination::Pagination, users::CurrentUser},
    db::{handlers::resources::ResourceFilter, models::resources::ResourceDBResponse},
    errors::{Error, Result},
    types::{Operation, Permission, Resource, UserId},
};

/// Whether `user` holds `operation` on `resource` in general (without looking at ownership).
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    if user.is_staff {
        return true;
    }
    match resource {
        Resource::Resources => matches!(operation, Operation::CreateOwn | Operation::ReadOwn | Operation::DeleteOwn),
        Resource::Users => matches!(operation, Operation::ReadOwn | Operation::UpdateOwn),
        Resource::AccountOptions => false,
    }
}

/// The `*Own` operation paired with an `*All` operation.
fn own_variant(operation: Operation) -> Operation {
    match operation {
        Operation::CreateAll | Operation::CreateOwn => Operation::CreateOwn,
        Operation::ReadAll | Operation::ReadOwn => Operation::ReadOwn,
        Operation::UpdateAll | Operation::UpdateOwn => Operation::UpdateOwn,
        Operation::DeleteAll | Operation::DeleteOwn => Operation::DeleteOwn,
    }
}

fn all_variant(operation: Operation) -> Operation {
    match operation {
        Operation::CreateAll | Operation::CreateOwn => Operation::CreateAll,
        Operation::ReadAll | Operation::ReadOwn => Operation::ReadAll,
        Operation::UpdateAll | Operation::UpdateOwn => Operation::UpdateAll,
        Operation::DeleteAll | Operation::DeleteOwn => Operation::DeleteAll,
    }
}

/// Reject non-staff callers from a staff-only operation.
pub fn require_admin(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    let operation = all_variant(operation);
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Check access to a row owned by `owner_id`: staff always, others only when they own it.
pub fn check_owner_access(user: &CurrentUser, resource: Resource, owner_id: UserId, operation: Operation) -> Result<()> {
    let all = all_variant(operation);
    let own = own_variant(operation);

    if has_permission(user, resource, all) || (owner_id == user.id && has_permission(user, resource, own)) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Any(vec![Permission::Allow(resource, all), Permission::Allow(resource, own)]),
        action: own,
        resource: format!("{resource} owned by another user"),
    })
}

/// Single-object access to a resource.
pub fn check_resource_access(user: &CurrentUser, resource: &ResourceDBResponse, operation: Operation) -> Result<()> {
    check_owner_access(user, Resource::Resources, resource.owner_id, operation)
}

/// Build the list filter for `GET /resources`.
///
/// Staff get exactly what they asked for. Everyone else gets the requested filter intersected
/// with their own ownership, so naming another account's id yields an empty list rather than
/// an error.
pub fn scope_resource_filter(user: &CurrentUser, requested_owner: Option<UserId>, pagination: &Pagination) -> ResourceFilter {
    ResourceFilter {
        owner_id: requested_owner,
        restrict_to: (!has_permission(user, Resource::Resources, Operation::ReadAll)).then_some(user.id),
        skip: pagination.skip(),
        limit: pagination.limit(),
    }
}

/// Type-level markers used by [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync {
        const RESOURCE: Resource;
    }

    pub struct Users;
    pub struct AccountOptions;
    pub struct Resources;

    impl ResourceMarker for Users {
        const RESOURCE: Resource = Resource::Users;
    }
    impl ResourceMarker for AccountOptions {
        const RESOURCE: Resource = Resource::AccountOptions;
    }
    impl ResourceMarker for Resources {
        const RESOURCE: Resource = Resource::Resources;
    }
}

pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync {
        const OPERATION: Operation;
    }

    pub struct CreateAll;
    pub struct ReadAll;
    pub struct UpdateAll;
    pub struct DeleteAll;

    impl OperationMarker for CreateAll {
        const OPERATION: Operation = Operation::CreateAll;
    }
    impl OperationMarker for ReadAll {
        const OPERATION: Operation = Operation::ReadAll;
    }
    impl OperationMarker for UpdateAll {
        const OPERATION: Operation = Operation::UpdateAll;
    }
    impl OperationMarker for DeleteAll {
        const OPERATION: Operation = Operation::DeleteAll;
    }
}

/// Extractor that authenticates the caller and enforces a permission before the handler body
/// runs, so staff-only endpoints answer `403` ahead of any lookup that could `404`.
///
/// ```ignore
/// async fn get_user(
///     RequiresPermission(caller, ..): RequiresPermission<resource::Users, operation::ReadAll>,
/// ) -> Result<Json<UserResponse>> { ... }
/// ```
pub struct RequiresPermission<R, O>(pub CurrentUser, pub PhantomData<(R, O)>);

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self(user, PhantomData))
    }
}
