pub mod models;
pub mod ledger;
pub mod state;
pub mod fulfillment;
pub mod interceptor;
pub mod diff;
pub mod refund;
pub mod modify;
pub mod service;

pub use models::{Fulfillment, FulfillmentState, Order, OrderLine, OrderState};
pub use diff::ChangeSet;
pub use interceptor::{InterceptorChain, OrderInterceptor};
pub use modify::{ModificationEngine, ModifyOrderInput};
pub use service::{OrderService, OrderServiceError};
