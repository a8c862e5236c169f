//! Restaurant and dish catalog.

use serde::{Deserialize, Serialize};

use common::{ProviderKey, RestaurantId};

use crate::order::value_objects::{DishId, Money};

/// A restaurant that cooks part of an order through an external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    /// Pickup address handed to the delivery provider.
    pub address: String,
    /// Which external client fulfills this restaurant's sub-orders.
    pub provider: ProviderKey,
}

impl Restaurant {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        provider: ProviderKey,
    ) -> Self {
        Self {
            id: RestaurantId::new(),
            name: name.into(),
            address: address.into(),
            provider,
        }
    }
}

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: DishId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub price: Money,
}

impl Dish {
    pub fn new(restaurant_id: RestaurantId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: DishId::new(),
            restaurant_id,
            name: name.into(),
            price,
        }
    }
}
