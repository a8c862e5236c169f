use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{OrderId, OrderStatus, RestaurantId};

use crate::catalog::{Dish, Restaurant};
use crate::order::model::Order;
use crate::order::value_objects::DishId;
use crate::store::{OrderStore, Result, StoreError};

/// In-memory order store implementation for testing.
///
/// This implementation keeps everything in memory and provides the same
/// interface as the PostgreSQL implementation. The status compare-and-set
/// runs under the write lock, giving it the same atomicity.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    restaurants: Arc<RwLock<HashMap<RestaurantId, Restaurant>>>,
    dishes: Arc<RwLock<HashMap<DishId, Dish>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clears all orders and catalog entries.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
        self.restaurants.write().await.clear();
        self.dishes.write().await.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    async fn add_restaurant(&self, restaurant: &Restaurant) -> Result<()> {
        self.restaurants
            .write()
            .await
            .insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn get_restaurant(&self, restaurant_id: RestaurantId) -> Result<Option<Restaurant>> {
        Ok(self.restaurants.read().await.get(&restaurant_id).cloned())
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        let mut restaurants: Vec<_> = self.restaurants.read().await.values().cloned().collect();
        restaurants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(restaurants)
    }

    async fn add_dish(&self, dish: &Dish) -> Result<()> {
        self.dishes.write().await.insert(dish.id, dish.clone());
        Ok(())
    }

    async fn get_dish(&self, dish_id: DishId) -> Result<Option<Dish>> {
        Ok(self.dishes.read().await.get(&dish_id).cloned())
    }

    async fn list_dishes(&self, restaurant_id: RestaurantId) -> Result<Vec<Dish>> {
        let mut dishes: Vec<_> = self
            .dishes
            .read()
            .await
            .values()
            .filter(|dish| dish.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(dishes)
    }
}
