use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, Money, max_len, uuid_id};

use crate::TransactionId;

uuid_id!(
    /// Payment identifier (tenant-scoped by the store).
    PaymentId,
    "PaymentId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    CreditCard,
    BankTransfer,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::CreditCard => "credit_card",
            PaymentType::BankTransfer => "bank_transfer",
        }
    }
}

impl core::str::FromStr for PaymentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(PaymentType::Cash),
            "credit_card" => Ok(PaymentType::CreditCard),
            "bank_transfer" => Ok(PaymentType::BankTransfer),
            other => Err(DomainError::validation(format!(
                "payment_method must be one of cash, credit_card, bank_transfer (got '{other}')"
            ))),
        }
    }
}

/// Money received (or paid out) against a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub processed_at: DateTime<Utc>,
    /// External reference, e.g. the hosted checkout session id.
    pub reference: Option<String>,
}

impl Payment {
    pub fn record(
        id: PaymentId,
        transaction_id: TransactionId,
        payment_type: PaymentType,
        amount: Money,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if let Some(r) = &reference {
            max_len("reference", r, 255)?;
        }
        Ok(Self {
            id,
            transaction_id,
            payment_type,
            amount: amount.bounded("amount")?,
            processed_at: now,
            reference,
        })
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
