//! Inventory domain module.
//!
//! Stock levels per product and the adjuster that keeps them consistent with
//! the transaction ledger. Pure domain logic (no IO, no HTTP, no storage).

pub mod adjuster;
pub mod stock;

pub use adjuster::{AdjustmentPlan, InventoryAdjuster, StockChange, StockDirection, StockMovement};
pub use stock::{Inventory, InventoryId};
