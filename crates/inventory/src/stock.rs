use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, uuid_id};
use rocktools_products::ProductId;

use crate::adjuster::StockChange;

uuid_id!(
    /// Inventory record identifier (tenant-scoped by the store).
    InventoryId,
    "InventoryId"
);

/// Stock level for one product (1:1 with the product).
///
/// `quantity` is never negative. Outside of construction it only changes through
/// an [`AdjustmentPlan`](crate::AdjustmentPlan) produced by the adjuster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: InventoryId,
    pub product_id: ProductId,
    quantity: i64,
    pub acquired_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Inventory {
    /// First receipt of a product into stock.
    pub fn receive(
        id: InventoryId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self {
            id,
            product_id,
            quantity,
            acquired_date: now,
            last_updated: now,
        })
    }

    /// Rehydrate a stored row.
    pub fn from_parts(
        id: InventoryId,
        product_id: ProductId,
        quantity: i64,
        acquired_date: DateTime<Utc>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            quantity,
            acquired_date,
            last_updated,
        }
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }

    /// Apply one planned change to this row.
    ///
    /// The change must target this product and must have been planned against the
    /// current quantity; anything else means the snapshot went stale.
    pub fn apply(&mut self, change: &StockChange, now: DateTime<Utc>) -> DomainResult<()> {
        if change.product_id != self.product_id {
            return Err(DomainError::invariant("stock change targets another product"));
        }
        if change.before != Some(self.quantity) {
            return Err(DomainError::conflict(format!(
                "stock for product {} changed concurrently",
                self.product_id
            )));
        }
        self.quantity = change.after;
        self.last_updated = now;
        Ok(())
    }
}

impl Entity for Inventory {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
