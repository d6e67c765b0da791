//! Inventory adjuster: keeps stock consistent with the transaction ledger.
//!
//! Adjusting is split in two steps:
//!
//! 1. [`InventoryAdjuster::plan`] is pure. It walks every movement of a transaction
//!    against a stock snapshot and either returns the complete set of row changes or
//!    fails. A sell that would underflow (or targets a product without stock)
//!    fails the whole plan, so nothing is mutated.
//! 2. The store applies the plan inside the same unit of work that commits the
//!    ledger entry.
//!
//! Applying a plan is not idempotent. The only callers are the store's ledger
//! commit and void operations, which run at most once per transaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult};
use rocktools_products::ProductId;

/// Direction of a stock movement, from the store's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    /// Goods come in (the store buys).
    Inbound,
    /// Goods go out (the store sells).
    Outbound,
}

/// One line of a transaction as seen by the adjuster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub direction: StockDirection,
}

impl StockMovement {
    pub fn inbound(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            direction: StockDirection::Inbound,
        }
    }

    pub fn outbound(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            direction: StockDirection::Outbound,
        }
    }

    /// The movement that undoes this one (used when voiding).
    pub fn reversed(&self) -> Self {
        Self {
            direction: match self.direction {
                StockDirection::Inbound => StockDirection::Outbound,
                StockDirection::Outbound => StockDirection::Inbound,
            },
            ..*self
        }
    }
}

/// Planned change to one inventory row.
///
/// `before == None` means the row does not exist yet and must be created at `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub before: Option<i64>,
    pub after: i64,
}

impl StockChange {
    pub fn creates_row(&self) -> bool {
        self.before.is_none()
    }

    pub fn delta(&self) -> i64 {
        self.after - self.before.unwrap_or(0)
    }
}

/// Complete, validated set of row changes for one transaction (or recount).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentPlan {
    changes: Vec<StockChange>,
}

impl AdjustmentPlan {
    pub fn changes(&self) -> &[StockChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn change_for(&self, product_id: ProductId) -> Option<&StockChange> {
        self.changes.iter().find(|c| c.product_id == product_id)
    }
}

/// Stateless inventory adjuster.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryAdjuster;

impl InventoryAdjuster {
    /// Plan the stock changes for a set of movements.
    ///
    /// `stock_of` returns the current quantity of a product's inventory row, or
    /// `None` when the product has no row. It is called at most once per product.
    ///
    /// - inbound: `quantity += n`, creating the row at `n` when absent;
    /// - outbound: `quantity -= n` only when enough stock remains, checked for every
    ///   movement before any change is returned.
    pub fn plan<F>(movements: &[StockMovement], mut stock_of: F) -> DomainResult<AdjustmentPlan>
    where
        F: FnMut(ProductId) -> Option<i64>,
    {
        if movements.is_empty() {
            return Err(DomainError::validation("transaction has no items"));
        }

        // product -> (quantity before, running quantity); BTreeMap keeps plans deterministic.
        let mut working: BTreeMap<ProductId, (Option<i64>, Option<i64>)> = BTreeMap::new();

        for m in movements {
            if m.quantity <= 0 {
                return Err(DomainError::validation("quantity must be greater than zero"));
            }

            let entry = working.entry(m.product_id).or_insert_with(|| {
                let current = stock_of(m.product_id);
                (current, current)
            });

            entry.1 = match (m.direction, entry.1) {
                (StockDirection::Inbound, current) => Some(
                    current
                        .unwrap_or(0)
                        .checked_add(m.quantity)
                        .ok_or_else(|| DomainError::validation("quantity overflow"))?,
                ),
                (StockDirection::Outbound, Some(available)) if available >= m.quantity => {
                    Some(available - m.quantity)
                }
                (StockDirection::Outbound, available) => {
                    tracing::debug!(
                        product_id = %m.product_id,
                        requested = m.quantity,
                        available = available.unwrap_or(0),
                        "rejecting outbound movement"
                    );
                    return Err(insufficient_stock(m.product_id, m.quantity, available.unwrap_or(0)));
                }
            };
        }

        let changes = working
            .into_iter()
            .filter_map(|(product_id, (before, after))| {
                let after = after?;
                (before != Some(after)).then_some(StockChange {
                    product_id,
                    before,
                    after,
                })
            })
            .collect();

        Ok(AdjustmentPlan { changes })
    }

    /// Plan the reversal of previously applied movements (voiding).
    pub fn plan_reversal<F>(movements: &[StockMovement], stock_of: F) -> DomainResult<AdjustmentPlan>
    where
        F: FnMut(ProductId) -> Option<i64>,
    {
        let reversed: Vec<StockMovement> = movements.iter().map(StockMovement::reversed).collect();
        Self::plan(&reversed, stock_of)
    }

    /// Plan a manual stock count: the row ends up at exactly `counted`.
    pub fn plan_recount(
        product_id: ProductId,
        current: Option<i64>,
        counted: i64,
    ) -> DomainResult<AdjustmentPlan> {
        if counted < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        let changes = if current == Some(counted) {
            Vec::new()
        } else {
            vec![StockChange {
                product_id,
                before: current,
                after: counted,
            }]
        };
        Ok(AdjustmentPlan { changes })
    }
}

fn insufficient_stock(product_id: ProductId, requested: i64, available: i64) -> DomainError {
    DomainError::invariant(format!(
        "Not enough stock for product {product_id} (requested {requested}, available {available})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(stock: &HashMap<ProductId, i64>) -> impl FnMut(ProductId) -> Option<i64> + '_ {
        move |id| stock.get(&id).copied()
    }

    #[test]
    fn buy_increases_existing_stock() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 4)]);
        let plan = InventoryAdjuster::plan(&[StockMovement::inbound(p, 6)], lookup(&stock)).unwrap();
        assert_eq!(
            plan.changes(),
            &[StockChange {
                product_id: p,
                before: Some(4),
                after: 10
            }]
        );
    }

    #[test]
    fn buy_creates_missing_row_at_requested_quantity() {
        let p = ProductId::new();
        let stock = HashMap::new();
        let plan = InventoryAdjuster::plan(&[StockMovement::inbound(p, 3)], lookup(&stock)).unwrap();
        let change = plan.change_for(p).unwrap();
        assert!(change.creates_row());
        assert_eq!(change.after, 3);
    }

    #[test]
    fn sell_decreases_stock_when_sufficient() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 5)]);
        let plan = InventoryAdjuster::plan(&[StockMovement::outbound(p, 5)], lookup(&stock)).unwrap();
        assert_eq!(plan.change_for(p).unwrap().after, 0);
    }

    #[test]
    fn sell_beyond_stock_is_rejected() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 2)]);
        let err = InventoryAdjuster::plan(&[StockMovement::outbound(p, 3)], lookup(&stock)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("Not enough stock")));
    }

    #[test]
    fn sell_without_inventory_row_is_rejected() {
        let p = ProductId::new();
        let stock = HashMap::new();
        assert!(InventoryAdjuster::plan(&[StockMovement::outbound(p, 1)], lookup(&stock)).is_err());
    }

    #[test]
    fn guard_covers_every_item_not_just_the_last() {
        let short = ProductId::new();
        let plenty = ProductId::new();
        let stock = HashMap::from([(short, 1), (plenty, 100)]);
        let movements = [StockMovement::outbound(short, 2), StockMovement::outbound(plenty, 1)];
        assert!(InventoryAdjuster::plan(&movements, lookup(&stock)).is_err());
    }

    #[test]
    fn repeated_product_lines_are_aggregated() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 5)]);
        let movements = [StockMovement::outbound(p, 3), StockMovement::outbound(p, 3)];
        assert!(InventoryAdjuster::plan(&movements, lookup(&stock)).is_err());

        let movements = [StockMovement::outbound(p, 2), StockMovement::outbound(p, 3)];
        let plan = InventoryAdjuster::plan(&movements, lookup(&stock)).unwrap();
        assert_eq!(plan.changes().len(), 1);
        assert_eq!(plan.change_for(p).unwrap().after, 0);
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 5)]);
        let err = InventoryAdjuster::plan(&[StockMovement::inbound(p, 0)], lookup(&stock)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reversal_of_sell_restocks() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 1)]);
        let plan =
            InventoryAdjuster::plan_reversal(&[StockMovement::outbound(p, 4)], lookup(&stock)).unwrap();
        assert_eq!(plan.change_for(p).unwrap().after, 5);
    }

    #[test]
    fn reversal_of_buy_is_guarded() {
        let p = ProductId::new();
        let stock = HashMap::from([(p, 1)]);
        assert!(InventoryAdjuster::plan_reversal(&[StockMovement::inbound(p, 4)], lookup(&stock)).is_err());
    }

    #[test]
    fn recount_sets_exact_quantity() {
        let p = ProductId::new();
        let plan = InventoryAdjuster::plan_recount(p, Some(9), 4).unwrap();
        assert_eq!(plan.change_for(p).unwrap().delta(), -5);
        assert!(InventoryAdjuster::plan_recount(p, Some(4), 4).unwrap().is_empty());
        assert!(InventoryAdjuster::plan_recount(p, None, -1).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn sell_within_stock_subtracts_exactly(stock_qty in 0i64..10_000, requested in 1i64..10_000) {
                prop_assume!(requested <= stock_qty);
                let p = ProductId::new();
                let stock = HashMap::from([(p, stock_qty)]);
                let plan = InventoryAdjuster::plan(&[StockMovement::outbound(p, requested)], lookup(&stock)).unwrap();
                prop_assert_eq!(plan.change_for(p).unwrap().after, stock_qty - requested);
            }

            #[test]
            fn sell_beyond_stock_never_plans_changes(stock_qty in 0i64..10_000, extra in 1i64..10_000) {
                let p = ProductId::new();
                let stock = HashMap::from([(p, stock_qty)]);
                let res = InventoryAdjuster::plan(&[StockMovement::outbound(p, stock_qty + extra)], lookup(&stock));
                prop_assert!(res.is_err());
            }

            #[test]
            fn buy_adds_exactly(start in proptest::option::of(0i64..10_000), requested in 1i64..10_000) {
                let p = ProductId::new();
                let mut stock = HashMap::new();
                if let Some(s) = start {
                    stock.insert(p, s);
                }
                let plan = InventoryAdjuster::plan(&[StockMovement::inbound(p, requested)], lookup(&stock)).unwrap();
                let change = plan.change_for(p).unwrap();
                prop_assert_eq!(change.after, start.unwrap_or(0) + requested);
                prop_assert_eq!(change.creates_row(), start.is_none());
            }

            #[test]
            fn plan_then_reverse_restores_stock(
                lines in prop::collection::vec((0usize..3, 1i64..50, any::<bool>()), 1..10)
            ) {
                let products = [ProductId::new(), ProductId::new(), ProductId::new()];
                let mut stock: HashMap<ProductId, i64> = products.iter().map(|p| (*p, 1_000)).collect();
                let original = stock.clone();

                let movements: Vec<StockMovement> = lines
                    .iter()
                    .map(|(i, q, inbound)| {
                        if *inbound {
                            StockMovement::inbound(products[*i], *q)
                        } else {
                            StockMovement::outbound(products[*i], *q)
                        }
                    })
                    .collect();

                let plan = InventoryAdjuster::plan(&movements, lookup(&stock)).unwrap();
                for c in plan.changes() {
                    stock.insert(c.product_id, c.after);
                }
                let undo = InventoryAdjuster::plan_reversal(&movements, lookup(&stock)).unwrap();
                for c in undo.changes() {
                    stock.insert(c.product_id, c.after);
                }
                prop_assert_eq!(stock, original);
            }
        }
    }
}
