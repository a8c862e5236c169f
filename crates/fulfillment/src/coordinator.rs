//! Orchestration of an order's path from placed to delivered.
//!
//! `schedule_order` fans an order out into one worker per restaurant.
//! Workers report back through `on_restaurant_status_changed`; once
//! every restaurant has cooked, exactly one of those reports wins the
//! order-status CAS and dispatches the delivery run. The coordinator
//! never polls anything itself, it only reacts and arbitrates.

use std::sync::Arc;

use common::{OrderId, OrderStatus};
use domain::{Order, OrderStore};
use tracking::{CacheStore, TrackingError, TrackingStore};

use crate::{
    FulfillmentConfig, FulfillmentError, Result, StatusNormalizer,
    dispatcher::DeliveryDispatcher,
    jobs::{JobKey, JobRegistry},
    providers::{OrderLine, ProviderRegistry},
    worker::RestaurantWorker,
};

pub struct FulfillmentCoordinator<S: OrderStore, C: CacheStore> {
    pub(crate) orders: Arc<S>,
    pub(crate) tracking: Arc<TrackingStore<C>>,
    pub(crate) providers: Arc<ProviderRegistry>,
    pub(crate) normalizer: Arc<StatusNormalizer>,
    pub(crate) jobs: JobRegistry,
    pub(crate) config: FulfillmentConfig,
}

impl<S, C> FulfillmentCoordinator<S, C>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    pub fn new(
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
            jobs: JobRegistry::new(),
            config,
        }
    }

    /// Seeds tracking state for a freshly placed order and starts one
    /// worker per restaurant.
    ///
    /// Every restaurant and its kitchen client is resolved up front, so
    /// a misconfigured order fails whole before any state is written or
    /// any external call is made.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn schedule_order(self: Arc<Self>, order: &Order) -> Result<()> {
        let restaurant_ids = order.restaurant_ids();
        if restaurant_ids.is_empty() {
            return Err(FulfillmentError::NothingToDispatch(order.id));
        }

        let mut workers = Vec::with_capacity(restaurant_ids.len());
        for &restaurant_id in &restaurant_ids {
            let restaurant = self
                .orders
                .get_restaurant(restaurant_id)
                .await?
                .ok_or(FulfillmentError::RestaurantNotFound(restaurant_id))?;
            let entry = self.providers.restaurant(&restaurant.provider)?.clone();
            let items = order
                .items_for_restaurant(restaurant_id)
                .into_iter()
                .map(|item| OrderLine {
                    dish: item.dish_name.clone(),
                    quantity: item.quantity,
                })
                .collect::<Vec<_>>();
            workers.push((restaurant, entry, items));
        }

        match self
            .tracking
            .init_order(order.id, restaurant_ids.iter().copied())
            .await
        {
            Ok(()) => {}
            // A record from an earlier scheduling attempt stays
            // authoritative; workers resume from whatever it says.
            Err(TrackingError::VersionConflict { .. }) => {
                tracing::debug!(order_id = %order.id, "tracking record already initialized");
            }
            Err(other) => return Err(other.into()),
        }

        for (restaurant, entry, items) in workers {
            let key = JobKey::Restaurant {
                order_id: order.id,
                restaurant_id: restaurant.id,
            };
            let worker =
                RestaurantWorker::new(Arc::clone(&self), order.id, restaurant, items, entry);
            let shutdown = self.jobs.subscribe_shutdown();
            self.jobs.spawn(key, worker.run(shutdown)).await;
        }

        metrics::counter!("fulfillment_orders_scheduled_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            restaurants = restaurant_ids.len(),
            "order scheduled for fulfillment"
        );
        Ok(())
    }

    /// Called whenever a restaurant sub-record changes. When the last
    /// kitchen reports cooked, the caller that wins the order-status CAS
    /// dispatches delivery; every other caller (late polls, replayed
    /// webhooks) finds the CAS already taken and does nothing.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn on_restaurant_status_changed(&self, order_id: OrderId) -> Result<()> {
        let record = match self.tracking.load(order_id).await {
            Ok(record) => record,
            Err(err @ TrackingError::MissingRecord(_)) => {
                metrics::counter!("fulfillment_tracking_missing_total").increment(1);
                tracing::error!(%order_id, "tracking record missing for in-flight order");
                return Err(err.into());
            }
            Err(other) => return Err(other.into()),
        };

        if !record.all_cooked() {
            return Ok(());
        }

        let won = self
            .orders
            .transition_status(
                order_id,
                &[OrderStatus::NotStarted, OrderStatus::Cooking],
                OrderStatus::Cooked,
            )
            .await?;
        if !won {
            return Ok(());
        }

        tracing::info!(%order_id, "all restaurants cooked, dispatching delivery");
        metrics::counter!("fulfillment_delivery_dispatched_total").increment(1);

        let dispatcher = DeliveryDispatcher::new(
            Arc::clone(&self.orders),
            Arc::clone(&self.tracking),
            Arc::clone(&self.providers),
            Arc::clone(&self.normalizer),
            self.config.clone(),
        );
        let shutdown = self.jobs.subscribe_shutdown();
        self.jobs
            .spawn(JobKey::Delivery { order_id }, async move {
                dispatcher.run(order_id, shutdown).await;
            })
            .await;
        Ok(())
    }

    /// First kitchen to start cooking moves the coarse order status off
    /// NOT_STARTED; later kitchens find the CAS already taken.
    pub(crate) async fn mark_cooking(&self, order_id: OrderId) -> Result<()> {
        self.orders
            .transition_status(order_id, &[OrderStatus::NotStarted], OrderStatus::Cooking)
            .await?;
        Ok(())
    }

    /// Signals every worker and dispatcher to wind down.
    pub fn shutdown(&self) {
        self.jobs.shutdown();
    }

    pub async fn active_jobs(&self) -> usize {
        self.jobs.active_count().await
    }
}
