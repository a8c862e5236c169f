//! Delivery booking and courier tracking.
//!
//! Spawned once per order, by whichever caller won the cooked CAS. The
//! dispatcher claims the order by moving it to delivery lookup, books a
//! courier with the order's delivery provider and then follows the ride
//! to delivered, either by polling or by handing over to the webhook
//! processor.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::time::sleep;

use common::{OrderId, OrderStatus, ProviderKey};
use domain::{Order, OrderStore};
use tracking::{CacheStore, DeliveryPatch, TrackingStore};

use crate::{
    FulfillmentConfig, FulfillmentError, Result, StatusNormalizer,
    jobs::retry_external,
    providers::{PlacedOrder, ProviderEntry, ProviderRegistry, ProviderRequest, UpdateStrategy},
};

pub(crate) struct DeliveryDispatcher<S: OrderStore, C: CacheStore> {
    orders: Arc<S>,
    tracking: Arc<TrackingStore<C>>,
    providers: Arc<ProviderRegistry>,
    normalizer: Arc<StatusNormalizer>,
    config: FulfillmentConfig,
}

impl<S, C> DeliveryDispatcher<S, C>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    pub(crate) fn new(
        orders: Arc<S>,
        tracking: Arc<TrackingStore<C>>,
        providers: Arc<ProviderRegistry>,
        normalizer: Arc<StatusNormalizer>,
        config: FulfillmentConfig,
    ) -> Self {
        Self {
            orders,
            tracking,
            providers,
            normalizer,
            config,
        }
    }

    pub(crate) async fn run(self, order_id: OrderId, mut shutdown: broadcast::Receiver<()>) {
        if let Err(err) = self.drive(order_id, &mut shutdown).await {
            metrics::counter!("fulfillment_dispatcher_failures_total").increment(1);
            tracing::error!(%order_id, error = %err, "delivery dispatch aborted");
        }
    }

    #[tracing::instrument(skip(self, shutdown), fields(order_id = %order_id))]
    async fn drive(
        &self,
        order_id: OrderId,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        // Claiming the lookup phase is the idempotency gate: a replayed
        // dispatch finds the order already past cooked and backs out.
        if !self
            .orders
            .transition_status(order_id, &[OrderStatus::Cooked], OrderStatus::DeliveryLookup)
            .await?
        {
            tracing::debug!(%order_id, "delivery already claimed, nothing to do");
            return Ok(());
        }

        let (addresses, comments) = self.pickup_points(&order).await?;
        let provider = ProviderKey::new(&order.delivery_provider);
        // Fatal on an unknown or non-courier key; the order stays in
        // delivery lookup for operators to see.
        let entry = self.providers.delivery(&provider)?.clone();

        let client = Arc::clone(&entry.client);
        let placed = retry_external(&self.config.retry, move || {
            let client = Arc::clone(&client);
            let addresses = addresses.clone();
            let comments = comments.clone();
            async move {
                client
                    .create_order(ProviderRequest::Delivery {
                        addresses,
                        comments,
                    })
                    .await
            }
        })
        .await?;
        tracing::info!(
            %order_id,
            provider = %provider,
            external_id = %placed.external_id,
            "courier booked"
        );

        self.tracking
            .merge_delivery(
                order_id,
                DeliveryPatch::booked(
                    placed.external_id.clone(),
                    OrderStatus::Delivery,
                    placed.location,
                ),
            )
            .await?;

        if entry.strategy == UpdateStrategy::Webhook {
            self.tracking
                .record_external_order(&provider, &placed.external_id, order_id, None)
                .await?;
        }

        // A webhook may already have finished the ride; the failed CAS
        // then leaves the terminal status in place.
        self.orders
            .transition_status(
                order_id,
                &[OrderStatus::DeliveryLookup],
                OrderStatus::Delivery,
            )
            .await?;

        if entry.strategy == UpdateStrategy::Webhook {
            // Progress now arrives through the webhook endpoint.
            return Ok(());
        }

        self.poll_until_delivered(order_id, &provider, &entry, placed, shutdown)
            .await
    }

    async fn poll_until_delivered(
        &self,
        order_id: OrderId,
        provider: &ProviderKey,
        entry: &ProviderEntry,
        placed: PlacedOrder,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let started = Instant::now();
        let external_id = placed.external_id;
        let mut last = (placed.status, placed.location);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(%order_id, "delivery dispatcher stopping on shutdown");
                    return Ok(());
                }
                _ = sleep(self.config.poll_interval) => {}
            }

            let client = Arc::clone(&entry.client);
            let id = external_id.clone();
            let snapshot = retry_external(&self.config.retry, move || {
                let client = Arc::clone(&client);
                let id = id.clone();
                async move { client.get_order(&id).await }
            })
            .await?;

            if last.0 == snapshot.status && last.1 == snapshot.location {
                continue;
            }
            let normalized = self.normalizer.normalize(provider, &snapshot.status)?;
            let location = snapshot.location;
            last = (snapshot.status, location);

            match normalized {
                OrderStatus::Delivered => {
                    self.tracking
                        .merge_delivery(
                            order_id,
                            DeliveryPatch::progress(OrderStatus::Delivered, location),
                        )
                        .await?;
                    self.orders
                        .transition_status(
                            order_id,
                            &[OrderStatus::DeliveryLookup, OrderStatus::Delivery],
                            OrderStatus::Delivered,
                        )
                        .await?;
                    metrics::counter!("fulfillment_orders_delivered_total").increment(1);
                    metrics::histogram!("fulfillment_delivery_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    tracing::info!(%order_id, "order delivered");
                    return Ok(());
                }
                OrderStatus::Delivery => {
                    self.tracking
                        .merge_delivery(
                            order_id,
                            DeliveryPatch::progress(OrderStatus::Delivery, location),
                        )
                        .await?;
                }
                // Courier has not picked up yet; only its position moved.
                _ => {
                    if let Some(location) = location {
                        self.tracking
                            .merge_delivery(order_id, DeliveryPatch::position(location))
                            .await?;
                    }
                }
            }
        }
    }

    async fn pickup_points(&self, order: &Order) -> Result<(Vec<String>, Vec<String>)> {
        let mut addresses = Vec::new();
        let mut comments = Vec::new();
        for restaurant_id in order.restaurant_ids() {
            let restaurant = self
                .orders
                .get_restaurant(restaurant_id)
                .await?
                .ok_or(FulfillmentError::RestaurantNotFound(restaurant_id))?;
            comments.push(format!("Delivery to the {}", restaurant.name));
            addresses.push(restaurant.address);
        }
        Ok((addresses, comments))
    }
}
