//! Durable storage for orders and the restaurant catalog.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use common::{OrderId, OrderStatus, RestaurantId};

use crate::catalog::{Dish, Restaurant};
use crate::order::model::Order;
use crate::order::value_objects::DishId;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A stored status value could not be parsed.
    #[error("Invalid stored order status: {0}")]
    InvalidStatus(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Core trait for durable order and catalog storage.
///
/// All implementations must be thread-safe (Send + Sync). Status changes
/// go through [`transition_status`](OrderStore::transition_status), an
/// atomic compare-and-set, so racing workers cannot move an order
/// backward or apply the same transition twice.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Retrieves an order.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Atomically moves an order's status to `to`, provided its current
    /// status is one of `from`.
    ///
    /// Returns true if this call performed the transition, false if the
    /// order was in none of the `from` statuses (typically because a
    /// concurrent caller transitioned it first). Fails with
    /// `OrderNotFound` if the order doesn't exist.
    async fn transition_status(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool>;

    /// Adds a restaurant to the catalog.
    async fn add_restaurant(&self, restaurant: &Restaurant) -> Result<()>;

    /// Retrieves a restaurant.
    ///
    /// Returns None if the restaurant doesn't exist.
    async fn get_restaurant(&self, restaurant_id: RestaurantId) -> Result<Option<Restaurant>>;

    /// Lists all restaurants in the catalog.
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// Adds a dish to a restaurant's menu.
    async fn add_dish(&self, dish: &Dish) -> Result<()>;

    /// Retrieves a dish.
    ///
    /// Returns None if the dish doesn't exist.
    async fn get_dish(&self, dish_id: DishId) -> Result<Option<Dish>>;

    /// Lists the dishes on one restaurant's menu.
    async fn list_dishes(&self, restaurant_id: RestaurantId) -> Result<Vec<Dish>>;
}
