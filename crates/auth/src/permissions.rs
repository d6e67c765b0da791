use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "records.read"). The wildcard `"*"` is
/// granted to admins and allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission(Cow::Borrowed("*"));
    /// List and view back-office records.
    pub const RECORDS_READ: Permission = Permission(Cow::Borrowed("records.read"));
    /// Insert, edit, delete and void back-office records.
    pub const RECORDS_WRITE: Permission = Permission(Cow::Borrowed("records.write"));
    /// Edit or delete employee records (clearance changes).
    pub const EMPLOYEES_WRITE: Permission = Permission(Cow::Borrowed("employees.write"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
