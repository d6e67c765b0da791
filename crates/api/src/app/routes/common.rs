use axum::http::StatusCode;
use axum::response::Response;

use rocktools_auth::{CommandAuthorization, Permission, Role};
use rocktools_parties::{Client, Employee};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Resolve the caller's client profile; staff tokens get 403.
pub async fn require_client(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<Client, Response> {
    if !principal.has_role(&Role::CLIENT) {
        return Err(errors::json_error(StatusCode::FORBIDDEN, "forbidden", "only clients have a cart"));
    }
    match services.client_of(tenant.tenant_id(), principal.user_id()).await {
        Ok(Some(client)) => Ok(client),
        Ok(None) => Err(errors::json_error(StatusCode::FORBIDDEN, "forbidden", "only clients have a cart")),
        Err(e) => Err(errors::store_error_to_response(e)),
    }
}

/// Resolve the caller's employee profile.
///
/// Non-staff callers get 401; staff whose account was never activated get 403.
pub async fn require_staff(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<Employee, Response> {
    if !principal.has_role(&Role::EMPLOYEE) {
        return Err(errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "staff login required"));
    }
    let employee = match services.staff_of(tenant.tenant_id(), principal.user_id()).await {
        Ok(Some(employee)) => employee,
        Ok(None) => {
            return Err(errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "staff login required"));
        }
        Err(e) => return Err(errors::store_error_to_response(e)),
    };
    if !employee.is_activated() {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Access Denied: Your account is not activated",
        ));
    }
    Ok(employee)
}
