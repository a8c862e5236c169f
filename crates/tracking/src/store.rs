use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{OrderId, ProviderKey, RestaurantId};

use crate::{
    Result, TrackingError,
    cache::{CacheStore, VERSION_NONE},
    record::{DeliveryPatch, RestaurantPatch, TrackingRecord},
};

/// Namespace holding one tracking record per in-flight order.
const ORDERS_NAMESPACE: &str = "orders";

/// How many times a merge retries after losing the version race before
/// reporting contention. Each retry re-reads the record, so a handful of
/// workers converge in one or two rounds.
const MERGE_ATTEMPTS: u32 = 16;

/// Mapping from a provider-assigned order id back to our order, stored
/// for providers that report progress via webhooks. Restaurant mappings
/// also carry the restaurant the external order was placed with, so an
/// update lands in the right sub-record; delivery mappings leave it
/// unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrderMapping {
    pub order_id: OrderId,
    pub restaurant_id: Option<RestaurantId>,
}

/// Typed view over the cache for order tracking state.
///
/// All mutation goes through field-level merges: a merge re-reads the
/// record, applies its patch and writes back with a version check, so
/// updates for different restaurants arriving concurrently never
/// overwrite each other. Whole-record writes happen only at
/// initialization.
pub struct TrackingStore<C: CacheStore> {
    cache: Arc<C>,
    order_ttl: Duration,
    mapping_ttl: Duration,
}

impl<C: CacheStore> TrackingStore<C> {
    pub fn new(cache: Arc<C>, order_ttl: Duration, mapping_ttl: Duration) -> Self {
        Self {
            cache,
            order_ttl,
            mapping_ttl,
        }
    }

    /// Seeds the tracking record for an order split across the given
    /// restaurants. Must happen exactly once, before any worker starts.
    #[tracing::instrument(skip(self, restaurant_ids), fields(order_id = %order_id))]
    pub async fn init_order(
        &self,
        order_id: OrderId,
        restaurant_ids: impl IntoIterator<Item = RestaurantId>,
    ) -> Result<()> {
        let record = TrackingRecord::for_restaurants(restaurant_ids);
        let value = serde_json::to_value(&record)?;
        self.cache
            .put_versioned(
                ORDERS_NAMESPACE,
                &order_id.to_string(),
                value,
                VERSION_NONE,
                self.order_ttl,
            )
            .await?;
        Ok(())
    }

    /// Loads the tracking record for an in-flight order.
    ///
    /// A missing record here means the order was dispatched but its state
    /// is gone (TTL elapsed, cache wiped). That is unrecoverable for the
    /// caller, so it surfaces as an error rather than an empty record.
    pub async fn load(&self, order_id: OrderId) -> Result<TrackingRecord> {
        self.find(order_id)
            .await?
            .ok_or(TrackingError::MissingRecord(order_id))
    }

    /// Loads the tracking record if one exists.
    pub async fn find(&self, order_id: OrderId) -> Result<Option<TrackingRecord>> {
        match self
            .cache
            .get(ORDERS_NAMESPACE, &order_id.to_string())
            .await?
        {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    /// Merges a patch into one restaurant's sub-record and returns the
    /// merged snapshot.
    #[tracing::instrument(skip(self, patch), fields(order_id = %order_id, restaurant_id = %restaurant_id))]
    pub async fn merge_restaurant(
        &self,
        order_id: OrderId,
        restaurant_id: RestaurantId,
        patch: RestaurantPatch,
    ) -> Result<TrackingRecord> {
        self.merge(order_id, |record| {
            let sub = record.restaurants.get_mut(&restaurant_id).ok_or(
                TrackingError::UnknownRestaurant {
                    order_id,
                    restaurant_id,
                },
            )?;
            patch.apply(sub);
            Ok(())
        })
        .await
    }

    /// Merges a patch into the delivery sub-record and returns the merged
    /// snapshot.
    #[tracing::instrument(skip(self, patch), fields(order_id = %order_id))]
    pub async fn merge_delivery(
        &self,
        order_id: OrderId,
        patch: DeliveryPatch,
    ) -> Result<TrackingRecord> {
        self.merge(order_id, |record| {
            patch.apply(&mut record.delivery);
            Ok(())
        })
        .await
    }

    /// Read-modify-write loop with optimistic concurrency. Lost races
    /// re-read and re-apply, so no concurrent merge is ever dropped.
    async fn merge(
        &self,
        order_id: OrderId,
        apply: impl Fn(&mut TrackingRecord) -> Result<()>,
    ) -> Result<TrackingRecord> {
        let key = order_id.to_string();
        for attempt in 1..=MERGE_ATTEMPTS {
            let entry = self
                .cache
                .get(ORDERS_NAMESPACE, &key)
                .await?
                .ok_or(TrackingError::MissingRecord(order_id))?;

            let mut record: TrackingRecord = serde_json::from_value(entry.value)?;
            apply(&mut record)?;

            let value = serde_json::to_value(&record)?;
            match self
                .cache
                .put_versioned(ORDERS_NAMESPACE, &key, value, entry.version, self.order_ttl)
                .await
            {
                Ok(_) => return Ok(record),
                Err(TrackingError::VersionConflict { .. }) => {
                    metrics::counter!("tracking_merge_conflicts_total").increment(1);
                    tracing::debug!(%order_id, attempt, "lost merge race, retrying");
                }
                Err(other) => return Err(other),
            }
        }

        tracing::warn!(%order_id, attempts = MERGE_ATTEMPTS, "merge contention exhausted");
        Err(TrackingError::MergeContention {
            order_id,
            attempts: MERGE_ATTEMPTS,
        })
    }

    /// Records which of our orders a provider-assigned external id belongs
    /// to, so a later webhook can find its way back.
    #[tracing::instrument(skip(self), fields(provider = %provider, order_id = %order_id))]
    pub async fn record_external_order(
        &self,
        provider: &ProviderKey,
        external_id: &str,
        order_id: OrderId,
        restaurant_id: Option<RestaurantId>,
    ) -> Result<()> {
        let mapping = ExternalOrderMapping {
            order_id,
            restaurant_id,
        };
        self.cache
            .put(
                &mapping_namespace(provider),
                external_id,
                serde_json::to_value(&mapping)?,
                self.mapping_ttl,
            )
            .await?;
        Ok(())
    }

    /// Resolves a provider-assigned external id back to our order.
    pub async fn find_by_external_order(
        &self,
        provider: &ProviderKey,
        external_id: &str,
    ) -> Result<Option<ExternalOrderMapping>> {
        match self
            .cache
            .get(&mapping_namespace(provider), external_id)
            .await?
        {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }
}

fn mapping_namespace(provider: &ProviderKey) -> String {
    format!("{provider}_orders")
}
