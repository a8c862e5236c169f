//! The persisted customer order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use common::{OrderId, OrderStatus, RestaurantId};

use crate::error::DomainError;
use crate::order::value_objects::{CustomerId, Money, OrderItem};

/// Largest quantity of a single dish accepted per item.
pub const MAX_ITEM_QUANTITY: u32 = 20;

/// A customer order, possibly spanning several restaurants.
///
/// The coarse `status` summarizes fulfillment across all participants and
/// only ever moves forward. Fine-grained per-restaurant progress lives in
/// the tracking record, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    /// Total charged, always computed from the items.
    pub total: Money,
    /// Requested delivery date.
    pub eta: NaiveDate,
    /// Delivery provider name as chosen by the customer. Resolved to an
    /// actual client only when delivery is dispatched.
    pub delivery_provider: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Validates and creates a new order.
    ///
    /// Rules: at least one item, every quantity within
    /// 1..=[`MAX_ITEM_QUANTITY`], and the delivery date at least one day
    /// after `today`. The total is computed here and never taken from
    /// the caller.
    pub fn place(
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        eta: NaiveDate,
        delivery_provider: impl Into<String>,
        today: NaiveDate,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        for item in &items {
            if item.quantity == 0 || item.quantity > MAX_ITEM_QUANTITY {
                return Err(DomainError::QuantityOutOfRange {
                    dish: item.dish_name.clone(),
                    quantity: item.quantity,
                    max: MAX_ITEM_QUANTITY,
                });
            }
        }
        if eta <= today {
            return Err(DomainError::EtaTooSoon { eta });
        }

        let total = items
            .iter()
            .map(OrderItem::total_price)
            .fold(Money::zero(), |acc, price| acc + price);

        Ok(Self {
            id: OrderId::new(),
            customer_id,
            items,
            total,
            eta,
            delivery_provider: delivery_provider.into(),
            status: OrderStatus::NotStarted,
            created_at: Utc::now(),
        })
    }

    /// Returns the distinct restaurants participating in this order, in
    /// the order they first appear among the items.
    pub fn restaurant_ids(&self) -> Vec<RestaurantId> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .map(|item| item.restaurant_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Returns the items cooked by one restaurant.
    pub fn items_for_restaurant(&self, restaurant_id: RestaurantId) -> Vec<&OrderItem> {
        self.items
            .iter()
            .filter(|item| item.restaurant_id == restaurant_id)
            .collect()
    }
}
