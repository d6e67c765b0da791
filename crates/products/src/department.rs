use serde::{Deserialize, Serialize};

use rocktools_core::{DomainResult, Entity, require_text, uuid_id};

uuid_id!(
    /// Department identifier (tenant-scoped by the store).
    DepartmentId,
    "DepartmentId"
);

/// Named grouping of products; doubles as a storefront navigation category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

impl Department {
    pub fn create(id: DepartmentId, name: &str) -> DomainResult<Self> {
        let name = normalize_name(name)?;
        Ok(Self { id, name })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = normalize_name(name)?;
        Ok(())
    }

    /// Storefront lookups match department names case-insensitively
    /// (`/department/hand tools` finds "Hand Tools").
    pub fn matches(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

impl Entity for Department {
    type Id = DepartmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn normalize_name(name: &str) -> DomainResult<String> {
    require_text("name", name, 100)?;
    Ok(name.trim().to_string())
}
