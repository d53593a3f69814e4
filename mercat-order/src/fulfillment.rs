use chrono::Utc;
use uuid::Uuid;

use crate::models::{Fulfillment, FulfillmentLine, FulfillmentState, Order, OrderState};
use crate::state;

/// Typed rejection for an illegal fulfillment state change.
///
/// Returned as a value, never a fault, so batch callers can display it
/// per-row without aborting sibling operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot transition fulfillment from {from:?} to {to:?}: {transition_error}")]
pub struct FulfillmentStateTransitionError {
    pub from: FulfillmentState,
    pub to: FulfillmentState,
    pub transition_error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Fulfillment not found: {0}")]
    NotFound(Uuid),

    #[error("Order line not found: {0}")]
    LineNotFound(Uuid),

    #[error("A fulfillment must cover at least one line")]
    NoLines,

    #[error("Quantity {requested} exceeds the fulfillable quantity {fulfillable} for line {line_id}")]
    QuantityExceedsFulfillable {
        line_id: Uuid,
        requested: u32,
        fulfillable: u32,
    },

    #[error("Order in state {0:?} cannot be fulfilled")]
    OrderNotFulfillable(OrderState),

    #[error(transparent)]
    Transition(#[from] FulfillmentStateTransitionError),
}

pub fn can_transition(from: FulfillmentState, to: FulfillmentState) -> bool {
    use FulfillmentState::*;
    matches!(
        (from, to),
        (Created, Shipped)
            | (Created, Cancelled)
            | (Shipped, Delivered)
            | (Shipped, Cancelled)
            // Reversal of a delivery that turned out to be wrong.
            | (Delivered, Cancelled)
    )
}

/// Create a fulfillment over some or all order lines, validating the
/// requested quantities against what is still unfulfilled.
pub fn create(
    order: &mut Order,
    method: impl Into<String>,
    lines: Vec<FulfillmentLine>,
) -> Result<Fulfillment, FulfillmentError> {
    if !matches!(
        order.state,
        OrderState::PaymentSettled
            | OrderState::PartiallyShipped
            | OrderState::Shipped
            | OrderState::PartiallyDelivered
    ) {
        return Err(FulfillmentError::OrderNotFulfillable(order.state));
    }
    if lines.is_empty() {
        return Err(FulfillmentError::NoLines);
    }
    for fl in &lines {
        let line = order
            .line(fl.line_id)
            .ok_or(FulfillmentError::LineNotFound(fl.line_id))?;
        let fulfillable = line.quantity.saturating_sub(order.fulfilled_quantity(fl.line_id));
        if fl.quantity == 0 || fl.quantity > fulfillable {
            return Err(FulfillmentError::QuantityExceedsFulfillable {
                line_id: fl.line_id,
                requested: fl.quantity,
                fulfillable,
            });
        }
    }

    let fulfillment = Fulfillment::new(order.id, method, lines);
    order.fulfillments.push(fulfillment.clone());
    Ok(fulfillment)
}

/// Transition a fulfillment and re-derive the owning order's state from
/// the aggregate fulfillment picture.
pub fn transition(
    order: &mut Order,
    fulfillment_id: Uuid,
    target: FulfillmentState,
) -> Result<Fulfillment, FulfillmentError> {
    let fulfillment = order
        .fulfillment_mut(fulfillment_id)
        .ok_or(FulfillmentError::NotFound(fulfillment_id))?;

    let from = fulfillment.state;
    if !can_transition(from, target) {
        let transition_error = if from == FulfillmentState::Cancelled {
            "a cancelled fulfillment cannot change state".to_string()
        } else {
            format!("no transition from {:?} to {:?}", from, target)
        };
        return Err(FulfillmentStateTransitionError {
            from,
            to: target,
            transition_error,
        }
        .into());
    }

    fulfillment.state = target;
    fulfillment.updated_at = Utc::now();
    let updated = fulfillment.clone();

    sync_order_state(order);
    Ok(updated)
}

/// Derive the order state implied by its fulfillments and apply it when
/// the order state machine allows the move.
fn sync_order_state(order: &mut Order) {
    let total: u32 = order.lines.iter().map(|l| l.quantity).sum();
    if total == 0 {
        return;
    }

    let quantity_in = |states: &[FulfillmentState]| -> u32 {
        order
            .fulfillments
            .iter()
            .filter(|f| states.contains(&f.state))
            .flat_map(|f| f.lines.iter())
            .map(|fl| fl.quantity)
            .sum()
    };
    let delivered = quantity_in(&[FulfillmentState::Delivered]);
    let shipped = quantity_in(&[FulfillmentState::Shipped, FulfillmentState::Delivered]);

    let derived = if delivered >= total {
        Some(OrderState::Delivered)
    } else if delivered > 0 {
        Some(OrderState::PartiallyDelivered)
    } else if shipped >= total {
        Some(OrderState::Shipped)
    } else if shipped > 0 {
        Some(OrderState::PartiallyShipped)
    } else {
        None
    };

    if let Some(target) = derived {
        if target != order.state {
            // Ignore derivations the order state machine forbids, e.g. a
            // cancelled order stays cancelled.
            let _ = state::transition(order, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderLine;
    use serde_json::json;

    fn settled_order(quantity: u32) -> (Order, Uuid) {
        let mut order = Order::new("EUR");
        let line = OrderLine::new(Uuid::new_v4(), "SKU-1", "Widget", quantity, 1000, 20.0, json!({}));
        let line_id = line.id;
        order.lines.push(line);
        order.state = OrderState::PaymentSettled;
        (order, line_id)
    }

    #[test]
    fn test_created_to_shipped_to_delivered() {
        let (mut order, line_id) = settled_order(2);
        let f = create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 2,
            }],
        )
        .unwrap();

        let f = transition(&mut order, f.id, FulfillmentState::Shipped).unwrap();
        assert_eq!(f.state, FulfillmentState::Shipped);
        assert_eq!(order.state, OrderState::Shipped);

        let f = transition(&mut order, f.id, FulfillmentState::Delivered).unwrap();
        assert_eq!(f.state, FulfillmentState::Delivered);
        assert_eq!(order.state, OrderState::Delivered);
    }

    #[test]
    fn test_created_to_delivered_is_rejected() {
        let (mut order, line_id) = settled_order(1);
        let f = create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 1,
            }],
        )
        .unwrap();

        let err = transition(&mut order, f.id, FulfillmentState::Delivered).unwrap_err();
        match err {
            FulfillmentError::Transition(e) => {
                assert_eq!(e.from, FulfillmentState::Created);
                assert_eq!(e.to, FulfillmentState::Delivered);
            }
            other => panic!("expected transition error, got {:?}", other),
        }
        assert_eq!(
            order.fulfillment(f.id).unwrap().state,
            FulfillmentState::Created
        );
    }

    #[test]
    fn test_no_way_out_of_cancelled() {
        let (mut order, line_id) = settled_order(1);
        let f = create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 1,
            }],
        )
        .unwrap();
        transition(&mut order, f.id, FulfillmentState::Cancelled).unwrap();

        for target in [
            FulfillmentState::Shipped,
            FulfillmentState::Delivered,
            FulfillmentState::Created,
        ] {
            let err = transition(&mut order, f.id, target).unwrap_err();
            match err {
                FulfillmentError::Transition(e) => {
                    assert_eq!(e.from, FulfillmentState::Cancelled)
                }
                other => panic!("expected transition error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_partial_fulfillment_drives_partial_states() {
        let (mut order, line_id) = settled_order(3);
        let f = create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 1,
            }],
        )
        .unwrap();
        transition(&mut order, f.id, FulfillmentState::Shipped).unwrap();
        assert_eq!(order.state, OrderState::PartiallyShipped);

        transition(&mut order, f.id, FulfillmentState::Delivered).unwrap();
        assert_eq!(order.state, OrderState::PartiallyDelivered);
    }

    #[test]
    fn test_quantity_validation() {
        let (mut order, line_id) = settled_order(2);
        create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 2,
            }],
        )
        .unwrap();

        // Everything already covered: a further fulfillment is rejected.
        let err = create(
            &mut order,
            "post",
            vec![FulfillmentLine {
                line_id,
                quantity: 1,
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::QuantityExceedsFulfillable { fulfillable: 0, .. }
        ));
    }
}
