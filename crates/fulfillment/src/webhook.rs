//! Processing of status callbacks from webhook providers.
//!
//! The HTTP layer owns authentication (secret-bearing paths); this
//! module owns the semantics. An update is resolved through the
//! external order mapping, normalized and merged exactly like a polled
//! status would be, so replayed callbacks and polls are interchangeable.

use std::sync::Arc;

use serde::Deserialize;

use common::{GeoPoint, OrderStatus, ProviderKey, ProviderRole};
use domain::OrderStore;
use tracking::{CacheStore, DeliveryPatch, RestaurantPatch};

use crate::{FulfillmentError, Result, coordinator::FulfillmentCoordinator};

/// A status callback as posted by a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookUpdate {
    /// The provider's own order id.
    pub id: String,
    /// Raw provider status.
    pub status: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// What became of a processed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The update was merged into tracking state.
    Applied,
    /// No mapping exists for the external id. The update cannot be
    /// attributed to any order and was logged and dropped.
    UnknownOrder,
}

pub struct WebhookProcessor<S: OrderStore, C: CacheStore> {
    coordinator: Arc<FulfillmentCoordinator<S, C>>,
}

impl<S, C> WebhookProcessor<S, C>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    pub fn new(coordinator: Arc<FulfillmentCoordinator<S, C>>) -> Self {
        Self { coordinator }
    }

    #[tracing::instrument(skip(self, update), fields(provider = %provider, external_id = %update.id))]
    pub async fn process(
        &self,
        provider: &ProviderKey,
        update: WebhookUpdate,
    ) -> Result<WebhookOutcome> {
        let role = self
            .coordinator
            .providers
            .get(provider)
            .map(|entry| entry.role)
            .ok_or_else(|| FulfillmentError::UnsupportedProvider(provider.to_string()))?;

        let Some(mapping) = self
            .coordinator
            .tracking
            .find_by_external_order(provider, &update.id)
            .await?
        else {
            return Ok(self.drop_unknown(provider, &update.id, "no mapping for external order"));
        };

        let status = self.coordinator.normalizer.normalize(provider, &update.status)?;
        match role {
            ProviderRole::Restaurant => {
                let Some(restaurant_id) = mapping.restaurant_id else {
                    // A kitchen mapping without its restaurant cannot be
                    // attributed to a sub-record; never guess one.
                    return Ok(self.drop_unknown(
                        provider,
                        &update.id,
                        "restaurant mapping lacks restaurant id",
                    ));
                };
                self.coordinator
                    .tracking
                    .merge_restaurant(mapping.order_id, restaurant_id, RestaurantPatch::status(status))
                    .await?;
                match status {
                    OrderStatus::Cooking => self.coordinator.mark_cooking(mapping.order_id).await?,
                    OrderStatus::Cooked => {
                        self.coordinator
                            .on_restaurant_status_changed(mapping.order_id)
                            .await?;
                    }
                    _ => {}
                }
            }
            ProviderRole::Delivery => match status {
                OrderStatus::Delivered => {
                    self.coordinator
                        .tracking
                        .merge_delivery(
                            mapping.order_id,
                            DeliveryPatch::progress(OrderStatus::Delivered, update.location),
                        )
                        .await?;
                    self.coordinator
                        .orders
                        .transition_status(
                            mapping.order_id,
                            &[OrderStatus::DeliveryLookup, OrderStatus::Delivery],
                            OrderStatus::Delivered,
                        )
                        .await?;
                    metrics::counter!("fulfillment_orders_delivered_total").increment(1);
                    tracing::info!(order_id = %mapping.order_id, "order delivered");
                }
                OrderStatus::Delivery => {
                    self.coordinator
                        .tracking
                        .merge_delivery(
                            mapping.order_id,
                            DeliveryPatch::progress(OrderStatus::Delivery, update.location),
                        )
                        .await?;
                }
                // Courier has not picked up yet; only its position moved.
                _ => {
                    if let Some(location) = update.location {
                        self.coordinator
                            .tracking
                            .merge_delivery(mapping.order_id, DeliveryPatch::position(location))
                            .await?;
                    }
                }
            },
        }

        metrics::counter!("fulfillment_webhooks_total").increment(1);
        Ok(WebhookOutcome::Applied)
    }

    fn drop_unknown(&self, provider: &ProviderKey, external_id: &str, why: &str) -> WebhookOutcome {
        metrics::counter!("fulfillment_webhook_unknown_total").increment(1);
        tracing::warn!(
            provider = %provider,
            external_id = %external_id,
            "{why}, dropping webhook"
        );
        WebhookOutcome::UnknownOrder
    }
}
