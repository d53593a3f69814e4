pub mod collaborators;
pub mod money;
pub mod payment;
pub mod repository;

pub use money::{Money, MoneyError};
