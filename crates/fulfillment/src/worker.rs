//! Per-restaurant cooking workers.
//!
//! One worker drives one restaurant's share of one order: place the
//! sub-order with the kitchen, then follow its status to cooked. For
//! polling providers the worker owns the whole loop; for webhook
//! providers it only places the order and records the external id
//! mapping, after which the webhook processor takes over.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::time::sleep;

use common::{OrderId, OrderStatus};
use domain::{OrderStore, Restaurant};
use tracking::{CacheStore, RestaurantPatch, TrackingError};

use crate::{
    Result,
    coordinator::FulfillmentCoordinator,
    jobs::retry_external,
    providers::{OrderLine, ProviderEntry, ProviderRequest, UpdateStrategy},
};

pub(crate) struct RestaurantWorker<S: OrderStore, C: CacheStore> {
    coordinator: Arc<FulfillmentCoordinator<S, C>>,
    order_id: OrderId,
    restaurant: Restaurant,
    items: Vec<OrderLine>,
    entry: ProviderEntry,
}

impl<S, C> RestaurantWorker<S, C>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    pub(crate) fn new(
        coordinator: Arc<FulfillmentCoordinator<S, C>>,
        order_id: OrderId,
        restaurant: Restaurant,
        items: Vec<OrderLine>,
        entry: ProviderEntry,
    ) -> Self {
        Self {
            coordinator,
            order_id,
            restaurant,
            items,
            entry,
        }
    }

    pub(crate) async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let order_id = self.order_id;
        let restaurant = self.restaurant.name.clone();
        if let Err(err) = self.drive(&mut shutdown).await {
            metrics::counter!("fulfillment_worker_failures_total").increment(1);
            tracing::error!(
                %order_id,
                restaurant = %restaurant,
                error = %err,
                "restaurant worker aborted"
            );
        }
    }

    async fn drive(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<()> {
        let (external_id, created_status) = self.ensure_placed().await?;

        if self.entry.strategy == UpdateStrategy::Webhook {
            self.coordinator
                .tracking
                .record_external_order(
                    &self.restaurant.provider,
                    &external_id,
                    self.order_id,
                    Some(self.restaurant.id),
                )
                .await?;
            if let Some(raw) = created_status {
                let status = self.normalize(&raw)?;
                self.apply_transitions(status).await?;
            }
            // Everything after this arrives through the webhook endpoint.
            return Ok(());
        }

        if let Some(raw) = &created_status {
            let status = self.normalize(raw)?;
            self.apply_transitions(status).await?;
            if status == OrderStatus::Cooked {
                return Ok(());
            }
        }
        self.poll_until_cooked(&external_id, created_status, shutdown)
            .await
    }

    /// Places the external order unless an earlier run already did.
    /// Returns the external id plus the raw creation status when this
    /// call actually placed the order.
    async fn ensure_placed(&self) -> Result<(String, Option<String>)> {
        let record = self.coordinator.tracking.load(self.order_id).await?;
        let sub = record
            .restaurant(&self.restaurant.id)
            .ok_or(TrackingError::UnknownRestaurant {
                order_id: self.order_id,
                restaurant_id: self.restaurant.id,
            })?;
        if let Some(existing) = &sub.external_id {
            tracing::debug!(
                order_id = %self.order_id,
                restaurant = %self.restaurant.name,
                external_id = %existing,
                "external order already placed, resuming"
            );
            return Ok((existing.clone(), None));
        }

        let client = Arc::clone(&self.entry.client);
        let items = self.items.clone();
        let placed = retry_external(&self.coordinator.config.retry, move || {
            let client = Arc::clone(&client);
            let items = items.clone();
            async move {
                client
                    .create_order(ProviderRequest::Restaurant { items })
                    .await
            }
        })
        .await?;

        let status = self.normalize(&placed.status)?;
        self.coordinator
            .tracking
            .merge_restaurant(
                self.order_id,
                self.restaurant.id,
                RestaurantPatch::placed(placed.external_id.clone(), status),
            )
            .await?;
        tracing::info!(
            order_id = %self.order_id,
            restaurant = %self.restaurant.name,
            external_id = %placed.external_id,
            status = %status,
            "order placed with kitchen"
        );
        Ok((placed.external_id, Some(placed.status)))
    }

    async fn poll_until_cooked(
        &self,
        external_id: &str,
        mut last_raw: Option<String>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(
                        order_id = %self.order_id,
                        restaurant = %self.restaurant.name,
                        "worker stopping on shutdown"
                    );
                    return Ok(());
                }
                _ = sleep(self.coordinator.config.poll_interval) => {}
            }

            let started = Instant::now();
            let client = Arc::clone(&self.entry.client);
            let id = external_id.to_string();
            let snapshot = retry_external(&self.coordinator.config.retry, move || {
                let client = Arc::clone(&client);
                let id = id.clone();
                async move { client.get_order(&id).await }
            })
            .await?;
            metrics::histogram!("fulfillment_poll_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            // Same raw status as last time means nothing to write.
            if last_raw.as_deref() == Some(snapshot.status.as_str()) {
                continue;
            }
            let status = self.normalize(&snapshot.status)?;
            self.coordinator
                .tracking
                .merge_restaurant(
                    self.order_id,
                    self.restaurant.id,
                    RestaurantPatch::status(status),
                )
                .await?;
            last_raw = Some(snapshot.status);

            self.apply_transitions(status).await?;
            if status == OrderStatus::Cooked {
                tracing::info!(
                    order_id = %self.order_id,
                    restaurant = %self.restaurant.name,
                    "restaurant finished cooking"
                );
                return Ok(());
            }
        }
    }

    /// Coarse order-status side effects of a sub-record change.
    async fn apply_transitions(&self, status: OrderStatus) -> Result<()> {
        match status {
            OrderStatus::Cooking => self.coordinator.mark_cooking(self.order_id).await,
            OrderStatus::Cooked => {
                self.coordinator
                    .on_restaurant_status_changed(self.order_id)
                    .await
            }
            _ => Ok(()),
        }
    }

    fn normalize(&self, raw: &str) -> Result<OrderStatus> {
        self.coordinator
            .normalizer
            .normalize(&self.restaurant.provider, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    use common::ProviderKey;
    use domain::{CustomerId, DishId, InMemoryOrderStore, Money, Order, OrderItem};
    use tracking::{InMemoryCache, TrackingStore};

    use crate::providers::{MockProviderClient, ProviderClient, ProviderRegistry};
    use crate::{FulfillmentConfig, StatusNormalizer};

    struct Fixture {
        coordinator: Arc<FulfillmentCoordinator<InMemoryOrderStore, InMemoryCache>>,
        orders: Arc<InMemoryOrderStore>,
        kitchen: Arc<MockProviderClient>,
        restaurant: Restaurant,
    }

    async fn fixture(provider: &str, strategy: UpdateStrategy) -> Fixture {
        let kitchen = Arc::new(MockProviderClient::restaurant(provider));
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderKey::new(provider),
            common::ProviderRole::Restaurant,
            strategy,
            Arc::clone(&kitchen) as Arc<dyn ProviderClient>,
        );

        let orders = Arc::new(InMemoryOrderStore::new());
        let tracking = Arc::new(TrackingStore::new(
            Arc::new(InMemoryCache::new()),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ));
        let coordinator = Arc::new(FulfillmentCoordinator::new(
            Arc::clone(&orders),
            tracking,
            Arc::new(registry),
            Arc::new(StatusNormalizer::with_defaults()),
            FulfillmentConfig::default(),
        ));

        let restaurant = Restaurant::new("Test Kitchen", "Main St 1", ProviderKey::new(provider));
        orders.add_restaurant(&restaurant).await.unwrap();
        Fixture {
            coordinator,
            orders,
            kitchen,
            restaurant,
        }
    }

    fn order_for(restaurant: &Restaurant) -> Order {
        let item = OrderItem::new(
            DishId::new(),
            restaurant.id,
            "Varenyky",
            2,
            Money::from_cents(8_00),
        );
        Order::place(
            CustomerId::new(),
            vec![item],
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            "uklon",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
        .unwrap()
    }

    async fn drain_jobs(
        coordinator: &Arc<FulfillmentCoordinator<InMemoryOrderStore, InMemoryCache>>,
    ) {
        while coordinator.active_jobs().await != 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn webhook_worker_places_once_and_records_mapping() {
        let fx = fixture("kfc", UpdateStrategy::Webhook).await;
        fx.kitchen.set_create_status("cooking");
        let order = order_for(&fx.restaurant);
        fx.orders.insert_order(&order).await.unwrap();

        Arc::clone(&fx.coordinator)
            .schedule_order(&order)
            .await
            .unwrap();
        drain_jobs(&fx.coordinator).await;

        assert_eq!(fx.kitchen.create_count(), 1);
        let record = fx.coordinator.tracking.load(order.id).await.unwrap();
        let sub = record.restaurant(&fx.restaurant.id).unwrap();
        assert_eq!(sub.external_id.as_deref(), Some("KFC-0001"));
        assert_eq!(sub.status, OrderStatus::Cooking);

        let mapping = fx
            .coordinator
            .tracking
            .find_by_external_order(&ProviderKey::new("kfc"), "KFC-0001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.order_id, order.id);
        assert_eq!(mapping.restaurant_id, Some(fx.restaurant.id));

        // First kitchen to cook flips the coarse status.
        let stored = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cooking);

        // Rescheduling resumes from the existing external order instead
        // of placing a second one.
        Arc::clone(&fx.coordinator)
            .schedule_order(&order)
            .await
            .unwrap();
        drain_jobs(&fx.coordinator).await;
        assert_eq!(fx.kitchen.create_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_worker_aborts_on_unrecognized_status() {
        let fx = fixture("silpo", UpdateStrategy::Polling).await;
        fx.kitchen.script_poll("incinerated");
        let order = order_for(&fx.restaurant);
        fx.orders.insert_order(&order).await.unwrap();

        Arc::clone(&fx.coordinator)
            .schedule_order(&order)
            .await
            .unwrap();
        drain_jobs(&fx.coordinator).await;

        // The worker died on the unknown vocabulary; nothing advanced.
        let record = fx.coordinator.tracking.load(order.id).await.unwrap();
        assert_eq!(
            record.restaurant(&fx.restaurant.id).unwrap().status,
            OrderStatus::NotStarted
        );
        let stored = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::NotStarted);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_worker_survives_transient_poll_failures() {
        let fx = fixture("silpo", UpdateStrategy::Polling).await;
        fx.kitchen.fail_next_gets(2);
        fx.kitchen.script_poll("cooking");
        let order = order_for(&fx.restaurant);
        fx.orders.insert_order(&order).await.unwrap();

        Arc::clone(&fx.coordinator)
            .schedule_order(&order)
            .await
            .unwrap();

        // Wait until the first successful poll has been merged.
        loop {
            let record = fx.coordinator.tracking.load(order.id).await.unwrap();
            if record.restaurant(&fx.restaurant.id).unwrap().status == OrderStatus::Cooking {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(fx.kitchen.get_count() >= 3);

        fx.coordinator.shutdown();
        drain_jobs(&fx.coordinator).await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling_workers_between_polls() {
        let fx = fixture("silpo", UpdateStrategy::Polling).await;
        // The script never reaches cooked, so only shutdown ends the loop.
        fx.kitchen.script_poll("cooking");
        let order = order_for(&fx.restaurant);
        fx.orders.insert_order(&order).await.unwrap();

        Arc::clone(&fx.coordinator)
            .schedule_order(&order)
            .await
            .unwrap();
        assert_eq!(fx.coordinator.active_jobs().await, 1);

        fx.coordinator.shutdown();
        drain_jobs(&fx.coordinator).await;
        assert_eq!(fx.coordinator.active_jobs().await, 0);
    }
}
