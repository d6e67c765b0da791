use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, max_len, require_text, uuid_id};

use crate::{ClientId, EmployeeId};

uuid_id!(
    /// Address identifier (tenant-scoped by the store).
    AddressId,
    "AddressId"
);

static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("static regex"));

/// Who an address belongs to: a client or an employee, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "owner_type", content = "owner_id", rename_all = "lowercase")]
pub enum AddressOwner {
    Client(ClientId),
    Employee(EmployeeId),
}

/// Editable address fields, as submitted by the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetails {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: String,
    pub city: String,
    pub zip_code: String,
}

impl AddressDetails {
    fn validate(self) -> DomainResult<Self> {
        require_text("street", &self.street, 255)?;
        require_text("number", &self.number, 20)?;
        max_len("complement", &self.complement, 100)?;
        require_text("city", &self.city, 100)?;
        let zip_code = self.zip_code.trim();
        if !ZIP_CODE.is_match(zip_code) {
            return Err(DomainError::validation(
                "zip_code must look like 12345 or 12345-6789",
            ));
        }
        Ok(Self {
            street: self.street.trim().to_string(),
            number: self.number.trim().to_string(),
            complement: self.complement.trim().to_string(),
            city: self.city.trim().to_string(),
            zip_code: zip_code.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub owner: AddressOwner,
    #[serde(flatten)]
    pub details: AddressDetails,
}

impl Address {
    pub fn create(id: AddressId, owner: AddressOwner, details: AddressDetails) -> DomainResult<Self> {
        Ok(Self {
            id,
            owner,
            details: details.validate()?,
        })
    }

    pub fn update(&mut self, details: AddressDetails) -> DomainResult<()> {
        self.details = details.validate()?;
        Ok(())
    }
}

impl Entity for Address {
    type Id = AddressId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
