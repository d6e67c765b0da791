//! Client shopping cart and its conversion into a sell transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, Money, uuid_id};
use rocktools_parties::ClientId;
use rocktools_products::ProductId;

use crate::{Transaction, TransactionId, TransactionItem, TransactionType};

uuid_id!(
    /// Cart identifier (tenant-scoped by the store).
    CartId,
    "CartId"
);

/// Staged line; same shape as a ledger item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.price.times(self.quantity)
    }
}

/// One cart per client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub client_id: ClientId,
    items: Vec<CartItem>,
}

impl Cart {
    pub fn open(id: CartId, client_id: ClientId) -> Self {
        Self {
            id,
            client_id,
            items: Vec::new(),
        }
    }

    pub fn from_parts(id: CartId, client_id: ClientId, items: Vec<CartItem>) -> Self {
        Self { id, client_id, items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> i64 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map_or(0, |i| i.quantity)
    }

    /// Add a product, merging with an existing line for the same product.
    ///
    /// The price snapshot of an existing line is kept.
    pub fn add(&mut self, product_id: ProductId, quantity: i64, price: Money) -> DomainResult<&CartItem> {
        if quantity <= 0 {
            return Err(DomainError::validation("Invalid quantity selected."));
        }
        let existing = self.items.iter().position(|i| i.product_id == product_id);
        let price = match existing {
            Some(idx) => self.items[idx].price,
            None => price.bounded("price")?,
        };
        // The cart must still be payable as one ledger entry after the change.
        self.total()?
            .checked_add(price.times(quantity)?)?
            .bounded("cart total")?;

        let idx = match existing {
            Some(idx) => {
                let line = &mut self.items[idx];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::validation("Invalid quantity selected."))?;
                idx
            }
            None => {
                self.items.push(CartItem {
                    product_id,
                    quantity,
                    price,
                });
                self.items.len() - 1
            }
        };
        Ok(&self.items[idx])
    }

    pub fn remove(&mut self, product_id: ProductId) -> DomainResult<CartItem> {
        let idx = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or(DomainError::not_found("cart item"))?;
        Ok(self.items.remove(idx))
    }

    pub fn total(&self) -> DomainResult<Money> {
        Money::total(self.items.iter().map(CartItem::line_total))
    }

    /// Drop every line for `product_id`; absent lines are fine.
    pub fn discard(&mut self, product_id: ProductId) {
        self.items.retain(|i| i.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Build the sell transaction this cart would become at checkout.
    ///
    /// Pure: the cart itself is left untouched; the store clears it in the same
    /// unit of work that commits the transaction.
    pub fn to_sell_transaction(&self, id: TransactionId, now: DateTime<Utc>) -> DomainResult<Transaction> {
        if self.is_empty() {
            return Err(DomainError::validation("Your cart is empty!"));
        }
        let items = self
            .items
            .iter()
            .map(|i| TransactionItem::new(i.product_id, i.quantity, i.price))
            .collect::<DomainResult<Vec<_>>>()?;
        Transaction::record(id, Some(self.client_id), TransactionType::Sell, items, now)
    }
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
