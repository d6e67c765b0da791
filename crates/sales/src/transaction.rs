use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, Money, uuid_id};
use rocktools_inventory::StockMovement;
use rocktools_parties::ClientId;
use rocktools_products::ProductId;

uuid_id!(
    /// Ledger entry identifier (tenant-scoped by the store).
    TransactionId,
    "TransactionId"
);

/// `buy` restocks (the store purchases), `sell` removes stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl core::str::FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(DomainError::validation(format!(
                "transaction_type must be 'buy' or 'sell' (got '{other}')"
            ))),
        }
    }
}

/// Immutable line snapshot: product, quantity and unit price at the time of sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

impl TransactionItem {
    pub fn new(product_id: ProductId, quantity: i64, price: Money) -> DomainResult<Self> {
        if quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        Ok(Self {
            product_id,
            quantity,
            price: price.bounded("price")?,
        })
    }

    pub fn line_total(&self) -> DomainResult<Money> {
        self.price.times(self.quantity)
    }
}

/// A ledger entry: one buy or sell with its item snapshots.
///
/// `total_amount` is always the sum of the item line totals; it is computed on
/// construction and never accepted as input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub client_id: Option<ClientId>,
    pub transaction_type: TransactionType,
    items: Vec<TransactionItem>,
    total_amount: Money,
    pub transaction_date: DateTime<Utc>,
    is_voided: bool,
}

impl Transaction {
    pub fn record(
        id: TransactionId,
        client_id: Option<ClientId>,
        transaction_type: TransactionType,
        items: Vec<TransactionItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::from_parts(id, client_id, transaction_type, items, now, false)
    }

    /// Rehydrate a stored entry; the total is recomputed from the items.
    pub fn from_parts(
        id: TransactionId,
        client_id: Option<ClientId>,
        transaction_type: TransactionType,
        items: Vec<TransactionItem>,
        transaction_date: DateTime<Utc>,
        is_voided: bool,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("transaction has no items"));
        }
        let total_amount =
            Money::total(items.iter().map(TransactionItem::line_total))?.bounded("total_amount")?;
        Ok(Self {
            id,
            client_id,
            transaction_type,
            items,
            total_amount,
            transaction_date,
            is_voided,
        })
    }

    pub fn items(&self) -> &[TransactionItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn is_voided(&self) -> bool {
        self.is_voided
    }

    /// Stock effect of this entry, one movement per item.
    pub fn stock_movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .map(|item| match self.transaction_type {
                TransactionType::Buy => StockMovement::inbound(item.product_id, item.quantity),
                TransactionType::Sell => StockMovement::outbound(item.product_id, item.quantity),
            })
            .collect()
    }

    /// Mark the entry voided and return the movements that were in effect, so the
    /// caller can plan their reversal in the same unit of work.
    pub fn void(&mut self) -> DomainResult<Vec<StockMovement>> {
        if self.is_voided {
            return Err(DomainError::conflict(format!(
                "transaction {} is already voided",
                self.id
            )));
        }
        self.is_voided = true;
        Ok(self.stock_movements())
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rocktools_inventory::StockDirection;

    fn item(qty: i64, cents: i64) -> TransactionItem {
        TransactionItem::new(ProductId::new(), qty, Money::from_cents(cents)).unwrap()
    }

    #[test]
    fn total_is_sum_of_lines() {
        let t = Transaction::record(
            TransactionId::new(),
            None,
            TransactionType::Sell,
            vec![item(2, 1050), item(1, 399)],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(t.total_amount(), Money::from_cents(2499));
    }

    #[test]
    fn empty_and_zero_quantity_rejected() {
        assert!(
            Transaction::record(TransactionId::new(), None, TransactionType::Buy, vec![], Utc::now())
                .is_err()
        );
        assert!(TransactionItem::new(ProductId::new(), 0, Money::from_cents(1)).is_err());
        assert!(TransactionItem::new(ProductId::new(), 1, Money::from_cents(-1)).is_err());
    }

    #[test]
    fn movements_follow_transaction_type() {
        let sell = Transaction::record(
            TransactionId::new(),
            None,
            TransactionType::Sell,
            vec![item(3, 100)],
            Utc::now(),
        )
        .unwrap();
        let m = sell.stock_movements();
        assert_eq!(m[0].direction, StockDirection::Outbound);
        assert_eq!(m[0].quantity, 3);
    }

    #[test]
    fn voiding_twice_is_a_conflict() {
        let mut t = Transaction::record(
            TransactionId::new(),
            None,
            TransactionType::Buy,
            vec![item(3, 100)],
            Utc::now(),
        )
        .unwrap();
        let movements = t.void().unwrap();
        assert_eq!(movements.len(), 1);
        assert!(t.is_voided());
        assert!(matches!(t.void(), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("SELL".parse::<TransactionType>().unwrap(), TransactionType::Sell);
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn item_prices_from_json_are_rounded_before_totalling() {
        let price: Money = serde_json::from_value(serde_json::json!("10.005")).unwrap();
        let line = TransactionItem::new(ProductId::new(), 1, price).unwrap();
        let t = Transaction::record(TransactionId::new(), None, TransactionType::Buy, vec![line], Utc::now())
            .unwrap();
        assert_eq!(t.items()[0].price, t.total_amount());
        assert_eq!(t.total_amount(), Money::from_cents(1001));
    }

    #[test]
    fn oversized_amounts_are_validation_errors() {
        let huge: Money = serde_json::from_value(serde_json::json!("79228162514264337593543950335")).unwrap();
        assert!(matches!(
            TransactionItem::new(ProductId::new(), 2, huge),
            Err(DomainError::Validation(_))
        ));

        let near_limit = item(2, 9_999_999_999);
        let err = Transaction::record(TransactionId::new(), None, TransactionType::Buy, vec![near_limit], Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::validation("total_amount must be less than 100000000"));

        let many = TransactionItem::new(ProductId::new(), i64::MAX, Money::from_cents(1)).unwrap();
        assert!(Transaction::record(TransactionId::new(), None, TransactionType::Buy, vec![many], Utc::now()).is_err());
    }

    proptest! {
        #[test]
        fn total_matches_line_sum(lines in prop::collection::vec((1i64..100, 0i64..100_000), 1..15)) {
            let items: Vec<_> = lines.iter().map(|(q, c)| item(*q, *c)).collect();
            let t = Transaction::record(TransactionId::new(), None, TransactionType::Sell, items, Utc::now()).unwrap();
            let expected: i64 = lines.iter().map(|(q, c)| q * c).sum();
            prop_assert_eq!(t.total_amount(), Money::from_cents(expected));
        }

        #[test]
        fn json_priced_lines_total_exactly(
            lines in prop::collection::vec((1i64..50, 0u32..10_000, 0u32..1_000), 1..10)
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|(q, units, mills)| {
                    let price: Money = serde_json::from_value(serde_json::json!(format!("{units}.{mills:03}"))).unwrap();
                    TransactionItem::new(ProductId::new(), *q, price).unwrap()
                })
                .collect();
            let t = Transaction::record(TransactionId::new(), None, TransactionType::Sell, items.clone(), Utc::now()).unwrap();
            let by_hand = items
                .iter()
                .map(|i| i.price.amount() * rust_decimal::Decimal::from(i.quantity))
                .sum::<rust_decimal::Decimal>();
            prop_assert_eq!(t.total_amount().amount(), by_hand);
        }
    }
}
