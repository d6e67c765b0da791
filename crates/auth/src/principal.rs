use serde::{Deserialize, Serialize};

use rocktools_core::TenantId;

/// A principal's membership in a tenant.
///
/// States which tenant the principal acts within and which roles/permissions
/// are granted there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}

impl TenantMembership {
    pub fn has_role(&self, role: &crate::Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
