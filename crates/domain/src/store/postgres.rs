use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{OrderId, OrderStatus, ProviderKey, RestaurantId};

use crate::catalog::{Dish, Restaurant};
use crate::order::model::Order;
use crate::order::value_objects::{CustomerId, DishId, Money};
use crate::store::{OrderStore, Result, StoreError};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items_json: serde_json::Value = row.try_get("items")?;
        let status_text: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_text)
            .ok_or_else(|| StoreError::InvalidStatus(status_text))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            items: serde_json::from_value(items_json)?,
            total: Money::from_cents(row.try_get("total_cents")?),
            eta: row.try_get("eta")?,
            delivery_provider: row.try_get("delivery_provider")?,
            status,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_restaurant(row: PgRow) -> Result<Restaurant> {
        let provider: String = row.try_get("provider")?;
        Ok(Restaurant {
            id: RestaurantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            provider: ProviderKey::new(&provider),
        })
    }

    fn row_to_dish(row: PgRow) -> Result<Dish> {
        Ok(Dish {
            id: DishId::from_uuid(row.try_get::<Uuid, _>("id")?),
            restaurant_id: RestaurantId::from_uuid(row.try_get::<Uuid, _>("restaurant_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self))]
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let items_json = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, items, total_cents, eta, delivery_provider, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(items_json)
        .bind(order.total.cents())
        .bind(order.eta)
        .bind(&order.delivery_provider)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, items, total_cents, eta, delivery_provider, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn transition_status(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool> {
        let from_values: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        // The WHERE clause makes the compare-and-set atomic: only one of
        // several racing callers sees a row to update.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1
            WHERE id = $2 AND status = ANY($3)
            "#,
        )
        .bind(to.as_str())
        .bind(order_id.as_uuid())
        .bind(&from_values)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // No row updated: either the order is past the expected statuses
        // or it doesn't exist at all.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Ok(false)
        } else {
            Err(StoreError::OrderNotFound(order_id))
        }
    }

    #[tracing::instrument(skip(self))]
    async fn add_restaurant(&self, restaurant: &Restaurant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurants (id, name, address, provider)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(restaurant.id.as_uuid())
        .bind(&restaurant.name)
        .bind(&restaurant.address)
        .bind(restaurant.provider.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_restaurant(&self, restaurant_id: RestaurantId) -> Result<Option<Restaurant>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, address, provider
            FROM restaurants
            WHERE id = $1
            "#,
        )
        .bind(restaurant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_restaurant).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, provider
            FROM restaurants
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_restaurant).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn add_dish(&self, dish: &Dish) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dishes (id, restaurant_id, name, price_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(dish.id.as_uuid())
        .bind(dish.restaurant_id.as_uuid())
        .bind(&dish.name)
        .bind(dish.price.cents())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_dish(&self, dish_id: DishId) -> Result<Option<Dish>> {
        let row = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, price_cents
            FROM dishes
            WHERE id = $1
            "#,
        )
        .bind(dish_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_dish).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn list_dishes(&self, restaurant_id: RestaurantId) -> Result<Vec<Dish>> {
        let rows = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, price_cents
            FROM dishes
            WHERE restaurant_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(restaurant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_dish).collect()
    }
}
