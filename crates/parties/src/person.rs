use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rocktools_auth::ClearanceCode;
use rocktools_core::{DomainResult, Entity, UserId, max_len, require_text, uuid_id};

uuid_id!(
    /// Client identifier (tenant-scoped by the store).
    ClientId,
    "ClientId"
);

uuid_id!(
    /// Employee identifier (tenant-scoped by the store).
    EmployeeId,
    "EmployeeId"
);

/// Name and document fields shared by clients and employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
    /// National document number; unique per tenant when present.
    #[serde(default)]
    pub document_id: Option<String>,
}

impl PersonName {
    pub fn new(first_name: &str, last_name: &str, document_id: Option<&str>) -> DomainResult<Self> {
        require_text("first_name", first_name, 20)?;
        require_text("last_name", last_name, 50)?;
        let document_id = document_id
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| max_len("document_id", d, 50).map(|_| d.to_string()))
            .transpose()?;
        Ok(Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            document_id,
        })
    }

    fn revalidate(self) -> DomainResult<Self> {
        Self::new(&self.first_name, &self.last_name, self.document_id.as_deref())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A customer account profile. Owns one cart and at most one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub name: PersonName,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn register(id: ClientId, user_id: UserId, name: PersonName, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            user_id,
            name: name.revalidate()?,
            created_at: now,
        })
    }

    pub fn rename(&mut self, name: PersonName) -> DomainResult<()> {
        self.name = name.revalidate()?;
        Ok(())
    }
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A staff account profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub name: PersonName,
    pub job_title: String,
    pub clearance_code: ClearanceCode,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn hire(
        id: EmployeeId,
        user_id: UserId,
        name: PersonName,
        job_title: &str,
        clearance_code: ClearanceCode,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        max_len("job_title", job_title, 100)?;
        Ok(Self {
            id,
            user_id,
            name: name.revalidate()?,
            job_title: job_title.trim().to_string(),
            clearance_code,
            created_at: now,
        })
    }

    /// Replace editable fields (back-office update).
    pub fn update(&mut self, name: PersonName, job_title: &str, clearance_code: ClearanceCode) -> DomainResult<()> {
        max_len("job_title", job_title, 100)?;
        self.name = name.revalidate()?;
        self.job_title = job_title.trim().to_string();
        self.clearance_code = clearance_code;
        Ok(())
    }

    pub fn is_activated(&self) -> bool {
        self.clearance_code.is_activated()
    }
}

impl Entity for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
