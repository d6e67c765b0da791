//! API-side authorization guard for back-office operations.
//!
//! Tokens only say "client" or "employee". Staff privileges come from the
//! employee's current clearance code, loaded per request, so a clearance change
//! takes effect without re-issuing tokens.

use rocktools_auth::{AuthzError, ClearanceCode, CommandAuthorization, Principal, TenantMembership};

use crate::context::{PrincipalContext, TenantContext};

/// Check authorization for an operation in the current request context.
///
/// Called **before** the store is touched.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    clearance: &ClearanceCode,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: clearance.permissions(),
    };

    let principal = Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    rocktools_auth::authorize::authorize_command(&principal, command)
}
