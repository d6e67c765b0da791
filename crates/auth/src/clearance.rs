//! Employee clearance codes.

use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult};

use crate::Permission;

/// Two-character staff privilege tier.
///
/// `99` is admin, `00` is a registered but not yet activated account, and any
/// other code is activated staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClearanceCode(String);

impl ClearanceCode {
    pub const ADMIN_CODE: &'static str = "99";
    pub const UNACTIVATED_CODE: &'static str = "00";

    pub fn parse(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        if code.chars().count() != 2 {
            return Err(DomainError::validation(
                "clearance_code must be exactly 2 characters",
            ));
        }
        Ok(Self(code.to_string()))
    }

    pub fn admin() -> Self {
        Self(Self::ADMIN_CODE.to_string())
    }

    pub fn unactivated() -> Self {
        Self(Self::UNACTIVATED_CODE.to_string())
    }

    /// Clearance for a newly registered employee: the first one becomes admin.
    pub fn for_new_employee(is_first_employee: bool) -> Self {
        if is_first_employee {
            Self::admin()
        } else {
            Self::unactivated()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN_CODE
    }

    pub fn is_activated(&self) -> bool {
        self.0 != Self::UNACTIVATED_CODE
    }

    /// Permissions granted by this code.
    pub fn permissions(&self) -> Vec<Permission> {
        if self.is_admin() {
            vec![Permission::ALL]
        } else if self.is_activated() {
            vec![Permission::RECORDS_READ, Permission::RECORDS_WRITE]
        } else {
            Vec::new()
        }
    }
}

impl TryFrom<String> for ClearanceCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClearanceCode> for String {
    fn from(value: ClearanceCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for ClearanceCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
