//! Order status machine.

use serde::{Deserialize, Serialize};

/// The coarse status of an order as it moves through fulfillment.
///
/// Status transitions:
/// ```text
/// NotStarted ──► Cooking ──► Cooked ──► DeliveryLookup ──► Delivery ──► Delivered
/// ```
///
/// The machine is one-way: every legal transition moves strictly forward.
/// Restaurant providers only ever report the cooking-side statuses and
/// delivery providers only the delivery-side ones; `DeliveryLookup` is set
/// internally while a courier is being arranged and never arrives from the
/// outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// No restaurant has started cooking yet.
    #[default]
    NotStarted,

    /// At least one restaurant is cooking.
    Cooking,

    /// All food is ready, delivery not yet arranged.
    Cooked,

    /// A delivery provider is being selected and booked.
    DeliveryLookup,

    /// A courier is under way.
    Delivery,

    /// The order reached the customer (terminal state).
    Delivered,
}

impl OrderStatus {
    /// Position of the status on the one-way lifecycle, used to enforce
    /// monotonic progress.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::NotStarted => 0,
            OrderStatus::Cooking => 1,
            OrderStatus::Cooked => 2,
            OrderStatus::DeliveryLookup => 3,
            OrderStatus::Delivery => 4,
            OrderStatus::Delivered => 5,
        }
    }

    /// Returns true if moving to `next` goes forward on the lifecycle.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Returns true if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::NotStarted => "not_started",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Cooked => "cooked",
            OrderStatus::DeliveryLookup => "delivery_lookup",
            OrderStatus::Delivery => "delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Parses a stored status name back into the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(OrderStatus::NotStarted),
            "cooking" => Some(OrderStatus::Cooking),
            "cooked" => Some(OrderStatus::Cooked),
            "delivery_lookup" => Some(OrderStatus::DeliveryLookup),
            "delivery" => Some(OrderStatus::Delivery),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_not_started() {
        assert_eq!(OrderStatus::default(), OrderStatus::NotStarted);
    }

    #[test]
    fn test_ranks_are_strictly_increasing() {
        let lifecycle = [
            OrderStatus::NotStarted,
            OrderStatus::Cooking,
            OrderStatus::Cooked,
            OrderStatus::DeliveryLookup,
            OrderStatus::Delivery,
            OrderStatus::Delivered,
        ];
        for pair in lifecycle.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_can_advance_forward_only() {
        assert!(OrderStatus::NotStarted.can_advance_to(OrderStatus::Cooking));
        assert!(OrderStatus::NotStarted.can_advance_to(OrderStatus::Cooked));
        assert!(OrderStatus::Cooked.can_advance_to(OrderStatus::DeliveryLookup));
        assert!(OrderStatus::Delivery.can_advance_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Cooking.can_advance_to(OrderStatus::NotStarted));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Delivery));
        assert!(!OrderStatus::Cooked.can_advance_to(OrderStatus::Cooked));
    }

    #[test]
    fn test_only_delivered_is_terminal() {
        assert!(!OrderStatus::NotStarted.is_terminal());
        assert!(!OrderStatus::Cooking.is_terminal());
        assert!(!OrderStatus::Cooked.is_terminal());
        assert!(!OrderStatus::DeliveryLookup.is_terminal());
        assert!(!OrderStatus::Delivery.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_as_str_parse_roundtrip() {
        for status in [
            OrderStatus::NotStarted,
            OrderStatus::Cooking,
            OrderStatus::Cooked,
            OrderStatus::DeliveryLookup,
            OrderStatus::Delivery,
            OrderStatus::Delivered,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("finished"), None);
    }

    #[test]
    fn test_serializes_as_snake_case() {
        let json = serde_json::to_string(&OrderStatus::DeliveryLookup).unwrap();
        assert_eq!(json, "\"delivery_lookup\"");
        let parsed: OrderStatus = serde_json::from_str("\"not_started\"").unwrap();
        assert_eq!(parsed, OrderStatus::NotStarted);
    }
}
