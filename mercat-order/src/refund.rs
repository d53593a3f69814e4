use chrono::Utc;
use mercat_core::payment::{Payment, Refund};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefundError {
    #[error("Refund target payment {0} is not settled")]
    TargetNotSettled(Uuid),

    #[error("Refund of {requested} exceeds the refundable amount {refundable}")]
    ExceedsCaptured { requested: i64, refundable: i64 },

    #[error("Refund currency {requested} does not match payment currency {payment}")]
    CurrencyMismatch { requested: String, payment: String },

    #[error("No refund is due for a non-negative price delta of {0}")]
    NothingToRefund(i64),

    #[error("Refund amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}

/// A refund derived from a price delta, ready to record against a
/// settled payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundAssessment {
    pub payment_id: Uuid,
    pub amount: i64,
    pub currency: String,
    /// Settled transaction the refund targets.
    pub transaction_id: String,
}

/// Derive the refund owed for a price delta (new total minus old total).
///
/// A non-negative delta means no refund is due. The target payment must
/// be settled with a transaction reference, and the refund can never
/// exceed what was captured (minus prior refunds) - validated here, at
/// commit time, not merely advised in the UI.
pub fn for_delta(
    price_delta: i64,
    currency: &str,
    payment: &Payment,
    requested_amount: Option<i64>,
) -> Result<Option<RefundAssessment>, RefundError> {
    if price_delta >= 0 {
        return Ok(None);
    }

    let transaction_id = match (&payment.transaction_id, payment.is_settled()) {
        (Some(txn), true) => txn.clone(),
        _ => return Err(RefundError::TargetNotSettled(payment.id)),
    };

    if payment.currency != currency {
        return Err(RefundError::CurrencyMismatch {
            requested: currency.to_string(),
            payment: payment.currency.clone(),
        });
    }

    let amount = requested_amount.unwrap_or(-price_delta);
    // An explicit amount is caller-supplied input; a zero or negative one
    // would be recorded as-is and inflate the refundable amount.
    if amount <= 0 {
        return Err(RefundError::NonPositiveAmount(amount));
    }
    let refundable = payment.refundable_amount();
    if amount > refundable {
        return Err(RefundError::ExceedsCaptured {
            requested: amount,
            refundable,
        });
    }

    Ok(Some(RefundAssessment {
        payment_id: payment.id,
        amount,
        currency: currency.to_string(),
        transaction_id,
    }))
}

/// Record an assessed refund against its payment.
pub fn record(
    payment: &mut Payment,
    assessment: &RefundAssessment,
    reason: Option<String>,
) -> Refund {
    let refund = Refund {
        id: Uuid::new_v4(),
        amount: assessment.amount,
        currency: assessment.currency.clone(),
        reason,
        transaction_id: assessment.transaction_id.clone(),
        created_at: Utc::now(),
    };
    payment.refunds.push(refund.clone());
    refund
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercat_core::payment::PaymentState;

    fn settled_payment(amount: i64) -> Payment {
        Payment::settled("card", amount, "EUR", "txn_1")
    }

    #[test]
    fn test_negative_delta_yields_refund() {
        let payment = settled_payment(2000);
        let assessment = for_delta(-500, "EUR", &payment, None).unwrap().unwrap();
        assert_eq!(assessment.amount, 500);
        assert_eq!(assessment.transaction_id, "txn_1");
    }

    #[test]
    fn test_non_negative_delta_means_no_refund() {
        let payment = settled_payment(2000);
        assert!(for_delta(0, "EUR", &payment, None).unwrap().is_none());
        assert!(for_delta(300, "EUR", &payment, None).unwrap().is_none());
    }

    #[test]
    fn test_refund_cannot_exceed_captured_amount() {
        let payment = settled_payment(2000);
        let err = for_delta(-2500, "EUR", &payment, None).unwrap_err();
        assert_eq!(
            err,
            RefundError::ExceedsCaptured {
                requested: 2500,
                refundable: 2000
            }
        );
    }

    #[test]
    fn test_prior_refunds_shrink_the_refundable_amount() {
        let mut payment = settled_payment(2000);
        let first = for_delta(-1500, "EUR", &payment, None).unwrap().unwrap();
        record(&mut payment, &first, None);

        let err = for_delta(-1000, "EUR", &payment, None).unwrap_err();
        assert_eq!(
            err,
            RefundError::ExceedsCaptured {
                requested: 1000,
                refundable: 500
            }
        );
    }

    #[test]
    fn test_unsettled_target_is_rejected() {
        let mut payment = settled_payment(2000);
        payment.state = PaymentState::Authorized;
        assert_eq!(
            for_delta(-500, "EUR", &payment, None).unwrap_err(),
            RefundError::TargetNotSettled(payment.id)
        );
    }

    #[test]
    fn test_explicit_amount_is_honoured() {
        let payment = settled_payment(2000);
        let assessment = for_delta(-500, "EUR", &payment, Some(300))
            .unwrap()
            .unwrap();
        assert_eq!(assessment.amount, 300);
    }

    #[test]
    fn test_non_positive_explicit_amount_is_rejected() {
        let payment = settled_payment(2000);
        // A negative amount would be recorded verbatim and push the
        // refundable amount past what was captured.
        assert_eq!(
            for_delta(-500, "EUR", &payment, Some(-10_000)).unwrap_err(),
            RefundError::NonPositiveAmount(-10_000)
        );
        assert_eq!(
            for_delta(-500, "EUR", &payment, Some(0)).unwrap_err(),
            RefundError::NonPositiveAmount(0)
        );
        assert_eq!(payment.refundable_amount(), 2000);
    }
}
