use std::collections::HashSet;

use thiserror::Error;

use rocktools_core::{TenantId, UserId};

use crate::{Permission, TenantMembership};

/// A fully resolved principal for authorization decisions.
///
/// The API derives it from verified claims plus, for staff, the employee's
/// current clearance code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorization contract for back-office operations.
///
/// The API checks these requirements before touching the store.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant context.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize every permission a command requires.
pub fn authorize_command<C>(principal: &Principal, command: &C) -> Result<(), AuthzError>
where
    C: CommandAuthorization + ?Sized,
{
    command
        .required_permissions()
        .iter()
        .try_for_each(|p| authorize(principal, p))
}
