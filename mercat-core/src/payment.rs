use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Authorized,
    Settled,
    Declined,
    Cancelled,
}

/// A payment captured against an order.
///
/// Payments are referenced by the order aggregate but live their own
/// lifecycle with the gateway; the engine only ever reads them and
/// appends refunds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub method: String,
    /// Captured amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub state: PaymentState,
    /// Gateway transaction reference, present once settled.
    pub transaction_id: Option<String>,
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn settled(
        method: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            amount,
            currency: currency.into(),
            state: PaymentState::Settled,
            transaction_id: Some(transaction_id.into()),
            refunds: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Amount still refundable: captured minus already refunded.
    pub fn refundable_amount(&self) -> i64 {
        let refunded: i64 = self.refunds.iter().map(|r| r.amount).sum();
        self.amount - refunded
    }

    pub fn is_settled(&self) -> bool {
        self.state == PaymentState::Settled && self.transaction_id.is_some()
    }
}

/// A refund recorded against a settled payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub reason: Option<String>,
    /// Reference of the settled transaction the refund targets.
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// Administrator request to refund part of a payment during a
/// modification commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub payment_id: Uuid,
    /// Minor units; defaults to the full negative price delta when
    /// omitted. Must not exceed the refundable amount.
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refundable_amount() {
        let mut payment = Payment::settled("card", 2000, "EUR", "txn_1");
        assert_eq!(payment.refundable_amount(), 2000);

        payment.refunds.push(Refund {
            id: Uuid::new_v4(),
            amount: 500,
            currency: "EUR".to_string(),
            reason: None,
            transaction_id: "txn_1".to_string(),
            created_at: Utc::now(),
        });
        assert_eq!(payment.refundable_amount(), 1500);
    }

    #[test]
    fn test_is_settled_requires_transaction_id() {
        let mut payment = Payment::settled("card", 2000, "EUR", "txn_1");
        assert!(payment.is_settled());
        payment.transaction_id = None;
        assert!(!payment.is_settled());
    }
}
