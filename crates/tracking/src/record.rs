//! The per-order tracking record and its field-level patches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::{GeoPoint, OrderStatus, RestaurantId};

/// Cooking progress of one restaurant's part of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSubRecord {
    /// Identifier the provider assigned when the sub-order was placed.
    /// None until placement succeeds.
    pub external_id: Option<String>,
    pub status: OrderStatus,
}

impl RestaurantSubRecord {
    fn unplaced() -> Self {
        Self {
            external_id: None,
            status: OrderStatus::NotStarted,
        }
    }
}

/// Delivery progress of the order as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySubRecord {
    /// Identifier the delivery provider assigned. None until booking.
    pub external_id: Option<String>,
    pub status: OrderStatus,
    /// Last courier position reported by the provider.
    pub location: Option<GeoPoint>,
}

impl DeliverySubRecord {
    fn pending() -> Self {
        Self {
            external_id: None,
            status: OrderStatus::NotStarted,
            location: None,
        }
    }
}

/// Live fulfillment state of one order: one cooking sub-record per
/// restaurant participating in the order, plus a single delivery slot.
///
/// The restaurant set is frozen when the record is created; merges only
/// ever update fields of existing sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub restaurants: HashMap<RestaurantId, RestaurantSubRecord>,
    pub delivery: DeliverySubRecord,
}

impl TrackingRecord {
    /// Creates the initial record for an order split across the given
    /// restaurants. Every sub-record starts unplaced and not started.
    pub fn for_restaurants(restaurant_ids: impl IntoIterator<Item = RestaurantId>) -> Self {
        Self {
            restaurants: restaurant_ids
                .into_iter()
                .map(|id| (id, RestaurantSubRecord::unplaced()))
                .collect(),
            delivery: DeliverySubRecord::pending(),
        }
    }

    /// Returns true if every restaurant has finished cooking.
    ///
    /// An order with no restaurants is never considered cooked; the
    /// check must not pass vacuously.
    pub fn all_cooked(&self) -> bool {
        !self.restaurants.is_empty()
            && self
                .restaurants
                .values()
                .all(|sub| sub.status == OrderStatus::Cooked)
    }

    /// Looks up one restaurant's sub-record.
    pub fn restaurant(&self, id: &RestaurantId) -> Option<&RestaurantSubRecord> {
        self.restaurants.get(id)
    }
}

/// Field-level update to a restaurant sub-record. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default)]
pub struct RestaurantPatch {
    pub external_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl RestaurantPatch {
    /// Patch recording a successful placement with the provider.
    pub fn placed(external_id: String, status: OrderStatus) -> Self {
        Self {
            external_id: Some(external_id),
            status: Some(status),
        }
    }

    /// Patch updating only the cooking status.
    pub fn status(status: OrderStatus) -> Self {
        Self {
            external_id: None,
            status: Some(status),
        }
    }

    pub(crate) fn apply(&self, sub: &mut RestaurantSubRecord) {
        if let Some(external_id) = &self.external_id {
            sub.external_id = Some(external_id.clone());
        }
        if let Some(status) = self.status {
            sub.status = status;
        }
    }
}

/// Field-level update to the delivery sub-record. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default)]
pub struct DeliveryPatch {
    pub external_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub location: Option<GeoPoint>,
}

impl DeliveryPatch {
    /// Patch recording a successful booking with the provider.
    pub fn booked(external_id: String, status: OrderStatus, location: Option<GeoPoint>) -> Self {
        Self {
            external_id: Some(external_id),
            status: Some(status),
            location,
        }
    }

    /// Patch updating the courier status and, when reported, position.
    pub fn progress(status: OrderStatus, location: Option<GeoPoint>) -> Self {
        Self {
            external_id: None,
            status: Some(status),
            location,
        }
    }

    /// Patch moving the courier position without touching the status.
    pub fn position(location: GeoPoint) -> Self {
        Self {
            external_id: None,
            status: None,
            location: Some(location),
        }
    }

    pub(crate) fn apply(&self, sub: &mut DeliverySubRecord) {
        if let Some(external_id) = &self.external_id {
            sub.external_id = Some(external_id.clone());
        }
        if let Some(status) = self.status {
            sub.status = status;
        }
        if let Some(location) = self.location {
            sub.location = Some(location);
        }
    }
}
