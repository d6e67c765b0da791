use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, Money, max_len, require_text, uuid_id};

use crate::DepartmentId;

uuid_id!(
    /// Product identifier (tenant-scoped by the store).
    ProductId,
    "ProductId"
);

static WEBSITE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9.-]+(:\d+)?(/\S*)?$").expect("static regex")
});

/// Editable product fields, as submitted by staff (create and update share them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub department_id: Option<DepartmentId>,
    pub description: String,
    pub brand: String,
    pub website_url: String,
    pub image_url: String,
    pub price: Money,
    pub cost: Money,
    #[serde(default)]
    pub product_family: String,
    /// Hosted checkout product code.
    #[serde(default)]
    pub stripe_product_code: Option<String>,
    /// Hosted checkout price code; required for a product to be sold online.
    #[serde(default)]
    pub stripe_price_code: Option<String>,
}

impl ProductDetails {
    fn validate(self) -> DomainResult<Self> {
        require_text("description", &self.description, 10_000)?;
        require_text("brand", &self.brand, 100)?;
        require_text("website_url", &self.website_url, 255)?;
        if !WEBSITE_URL.is_match(self.website_url.trim()) {
            return Err(DomainError::validation("website_url must be a valid http(s) URL"));
        }
        require_text("image_url", &self.image_url, 255)?;
        max_len("product_family", &self.product_family, 100)?;
        if let Some(code) = &self.stripe_product_code {
            max_len("stripe_product_code", code, 255)?;
        }
        if let Some(code) = &self.stripe_price_code {
            max_len("stripe_price_code", code, 255)?;
        }
        let price = self.price.bounded("price")?;
        let cost = self.cost.bounded("cost")?;

        Ok(Self {
            description: self.description.trim().to_string(),
            brand: self.brand.trim().to_string(),
            website_url: self.website_url.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            product_family: self.product_family.trim().to_string(),
            stripe_product_code: blank_to_none(self.stripe_product_code),
            stripe_price_code: blank_to_none(self.stripe_price_code),
            price,
            cost,
            ..self
        })
    }
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Catalog item. Stock lives in the 1:1 inventory record, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(flatten)]
    pub details: ProductDetails,
}

impl Product {
    pub fn create(id: ProductId, details: ProductDetails) -> DomainResult<Self> {
        Ok(Self {
            id,
            details: details.validate()?,
        })
    }

    pub fn update(&mut self, details: ProductDetails) -> DomainResult<()> {
        self.details = details.validate()?;
        Ok(())
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.details.department_id
    }

    pub fn description(&self) -> &str {
        &self.details.description
    }

    pub fn price(&self) -> Money {
        self.details.price
    }

    /// Price code for the hosted checkout page, if the product is sellable online.
    pub fn checkout_price_code(&self) -> DomainResult<&str> {
        self.details.stripe_price_code.as_deref().ok_or_else(|| {
            DomainError::validation(format!(
                "{} cannot be purchased online (no checkout price code)",
                self.details.description
            ))
        })
    }

    /// Department removal leaves its products uncategorized.
    pub fn detach_department(&mut self) {
        self.details.department_id = None;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
