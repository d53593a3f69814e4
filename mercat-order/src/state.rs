use crate::models::{Order, OrderState};

/// Typed rejection for an illegal order state change. Returned as a value
/// so callers can surface the attempted from/to pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Transition from {from:?} to {to:?} is not allowed")]
pub struct OrderStateTransitionError {
    pub from: OrderState,
    pub to: OrderState,
}

/// Explicit transition table. Delivered and Cancelled are terminal for
/// the main flow; Modifying is transient and only reachable from a
/// post-payment state.
pub fn can_transition(from: OrderState, to: OrderState) -> bool {
    use OrderState::*;
    matches!(
        (from, to),
        (AddingItems, ArrangingPayment)
            | (AddingItems, Cancelled)
            | (ArrangingPayment, AddingItems)
            | (ArrangingPayment, PaymentAuthorized)
            | (ArrangingPayment, PaymentSettled)
            | (ArrangingPayment, Cancelled)
            | (PaymentAuthorized, PaymentSettled)
            | (PaymentAuthorized, Cancelled)
            | (PaymentAuthorized, Modifying)
            | (PaymentSettled, PartiallyShipped)
            | (PaymentSettled, Shipped)
            | (PaymentSettled, Cancelled)
            | (PaymentSettled, Modifying)
            | (PartiallyShipped, Shipped)
            | (PartiallyShipped, PartiallyDelivered)
            | (PartiallyShipped, Cancelled)
            | (PartiallyShipped, Modifying)
            | (Shipped, PartiallyDelivered)
            | (Shipped, Delivered)
            | (Shipped, Cancelled)
            | (Shipped, Modifying)
            | (PartiallyDelivered, Delivered)
            | (PartiallyDelivered, Modifying)
            | (Modifying, PaymentAuthorized)
            | (Modifying, PaymentSettled)
            | (Modifying, PartiallyShipped)
            | (Modifying, Shipped)
            | (Modifying, PartiallyDelivered)
    )
}

/// States from which a modification commit may enter Modifying.
pub fn can_enter_modifying(state: OrderState) -> bool {
    can_transition(state, OrderState::Modifying)
}

/// Apply a transition to the order, or reject it without touching state.
pub fn transition(order: &mut Order, to: OrderState) -> Result<(), OrderStateTransitionError> {
    let from = order.state;
    if !can_transition(from, to) {
        return Err(OrderStateTransitionError { from, to });
    }
    order.state = to;
    Ok(())
}

/// States in which lines may be mutated directly (outside the
/// modification protocol).
pub fn lines_editable(state: OrderState) -> bool {
    matches!(state, OrderState::AddingItems | OrderState::ArrangingPayment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_flow() {
        let mut order = Order::new("EUR");
        for target in [
            OrderState::ArrangingPayment,
            OrderState::PaymentSettled,
            OrderState::PartiallyShipped,
            OrderState::Shipped,
            OrderState::Delivered,
        ] {
            transition(&mut order, target).unwrap();
            assert_eq!(order.state, target);
        }
    }

    #[test]
    fn test_illegal_transition_reports_from_and_to() {
        let mut order = Order::new("EUR");
        let err = transition(&mut order, OrderState::Shipped).unwrap_err();
        assert_eq!(err.from, OrderState::AddingItems);
        assert_eq!(err.to, OrderState::Shipped);
        // State is untouched on rejection.
        assert_eq!(order.state, OrderState::AddingItems);
    }

    #[test]
    fn test_terminal_states() {
        for terminal in [OrderState::Delivered, OrderState::Cancelled] {
            let mut order = Order::new("EUR");
            order.state = terminal;
            for target in [
                OrderState::AddingItems,
                OrderState::PaymentSettled,
                OrderState::Shipped,
                OrderState::Modifying,
            ] {
                assert!(transition(&mut order, target).is_err());
            }
        }
    }

    #[test]
    fn test_modifying_round_trip() {
        let mut order = Order::new("EUR");
        order.state = OrderState::PaymentSettled;
        transition(&mut order, OrderState::Modifying).unwrap();
        transition(&mut order, OrderState::PaymentSettled).unwrap();
        assert_eq!(order.state, OrderState::PaymentSettled);
    }

    #[test]
    fn test_modifying_unreachable_pre_payment() {
        assert!(!can_enter_modifying(OrderState::AddingItems));
        assert!(!can_enter_modifying(OrderState::ArrangingPayment));
        assert!(can_enter_modifying(OrderState::PaymentSettled));
        assert!(can_enter_modifying(OrderState::Shipped));
    }
}
