//! Domain error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors from order validation rules.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    /// An order was placed without any items.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// An item quantity fell outside the accepted range.
    #[error("Quantity {quantity} for dish '{dish}' is out of range (1..={max})")]
    QuantityOutOfRange {
        dish: String,
        quantity: u32,
        max: u32,
    },

    /// The requested delivery date leaves no time to fulfill the order.
    #[error("Delivery date {eta} must be at least one day ahead")]
    EtaTooSoon { eta: NaiveDate },
}
