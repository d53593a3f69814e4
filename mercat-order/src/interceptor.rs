use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, OrderLine};

/// Proposed addition of a variant to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLineInput {
    pub variant_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub custom_fields: Value,
}

/// Proposed quantity/custom-field change on an existing line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustLineInput {
    pub line_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub custom_fields: Option<Value>,
}

/// Business-rule rejection of a line mutation. The string is surfaced to
/// the caller verbatim, exactly as the vetoing interceptor returned it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{interceptor_error}")]
pub struct InterceptorVetoError {
    pub interceptor_error: String,
}

impl InterceptorVetoError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            interceptor_error: reason.into(),
        }
    }
}

/// A pluggable veto hook invoked before line mutations.
///
/// Hooks receive the pre-mutation order (read-only) and the proposed
/// input, never the would-be result. Returning `Some(reason)` vetoes the
/// mutation; the default for every hook is to allow it.
pub trait OrderInterceptor: Send + Sync {
    fn will_add_line(&self, _order: &Order, _input: &AddLineInput) -> Option<String> {
        None
    }

    fn will_adjust_line(
        &self,
        _order: &Order,
        _line: &OrderLine,
        _input: &AdjustLineInput,
    ) -> Option<String> {
        None
    }

    fn will_remove_line(&self, _order: &Order, _line: &OrderLine) -> Option<String> {
        None
    }
}

const PANICKED_HOOK_REASON: &str = "Order interceptor failed";

/// Ordered list of interceptors, built once at process start.
///
/// Hooks run in registration order and the chain stops at the first veto.
/// A hook that panics is treated as a veto with a generic reason, never
/// as success.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn OrderInterceptor>>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn OrderInterceptor>>) -> Self {
        Self { interceptors }
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn check_add_line(
        &self,
        order: &Order,
        input: &AddLineInput,
    ) -> Result<(), InterceptorVetoError> {
        self.run(|i| i.will_add_line(order, input))
    }

    pub fn check_adjust_line(
        &self,
        order: &Order,
        line: &OrderLine,
        input: &AdjustLineInput,
    ) -> Result<(), InterceptorVetoError> {
        self.run(|i| i.will_adjust_line(order, line, input))
    }

    pub fn check_remove_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> Result<(), InterceptorVetoError> {
        self.run(|i| i.will_remove_line(order, line))
    }

    fn run<F>(&self, hook: F) -> Result<(), InterceptorVetoError>
    where
        F: Fn(&dyn OrderInterceptor) -> Option<String>,
    {
        for interceptor in &self.interceptors {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook(interceptor.as_ref())));
            match outcome {
                Ok(None) => continue,
                Ok(Some(reason)) => return Err(InterceptorVetoError::new(reason)),
                Err(_) => {
                    tracing::warn!("order interceptor panicked; treating as veto");
                    return Err(InterceptorVetoError::new(PANICKED_HOOK_REASON));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MinQuantity {
        variant_id: Uuid,
        min: u32,
    }

    impl OrderInterceptor for MinQuantity {
        fn will_add_line(&self, _order: &Order, input: &AddLineInput) -> Option<String> {
            (input.variant_id == self.variant_id && input.quantity < self.min)
                .then(|| format!("Quantity must be at least {}", self.min))
        }

        fn will_adjust_line(
            &self,
            _order: &Order,
            line: &OrderLine,
            input: &AdjustLineInput,
        ) -> Option<String> {
            (line.variant_id == self.variant_id && input.quantity < self.min)
                .then(|| format!("Quantity must be at least {}", self.min))
        }
    }

    struct AlwaysAllow;
    impl OrderInterceptor for AlwaysAllow {}

    struct Panicking;
    impl OrderInterceptor for Panicking {
        fn will_add_line(&self, _order: &Order, _input: &AddLineInput) -> Option<String> {
            panic!("boom")
        }
    }

    fn input(variant_id: Uuid, quantity: u32) -> AddLineInput {
        AddLineInput {
            variant_id,
            quantity,
            custom_fields: json!({}),
        }
    }

    #[test]
    fn test_first_veto_wins_and_is_verbatim() {
        let variant_id = Uuid::new_v4();
        let chain = InterceptorChain::new(vec![
            Arc::new(AlwaysAllow),
            Arc::new(MinQuantity { variant_id, min: 2 }),
        ]);
        let order = Order::new("EUR");

        let err = chain.check_add_line(&order, &input(variant_id, 1)).unwrap_err();
        assert_eq!(err.interceptor_error, "Quantity must be at least 2");

        assert!(chain.check_add_line(&order, &input(variant_id, 2)).is_ok());
        // Other variants are not this interceptor's business.
        assert!(chain
            .check_add_line(&order, &input(Uuid::new_v4(), 1))
            .is_ok());
    }

    #[test]
    fn test_panicking_hook_is_a_veto_not_a_success() {
        let chain = InterceptorChain::new(vec![Arc::new(Panicking)]);
        let order = Order::new("EUR");
        let err = chain
            .check_add_line(&order, &input(Uuid::new_v4(), 1))
            .unwrap_err();
        assert_eq!(err.interceptor_error, PANICKED_HOOK_REASON);
    }

    #[test]
    fn test_empty_chain_allows_everything() {
        let chain = InterceptorChain::default();
        let order = Order::new("EUR");
        assert!(chain.check_add_line(&order, &input(Uuid::new_v4(), 1)).is_ok());
    }
}
