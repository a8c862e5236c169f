use thiserror::Error;

use common::{OrderId, RestaurantId};

/// Errors that can occur when interacting with the tracking cache.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A concurrent writer updated the entry between read and write.
    /// The expected version did not match the actual version.
    #[error("Version conflict for {namespace}:{key}: expected version {expected}, found {actual}")]
    VersionConflict {
        namespace: String,
        key: String,
        expected: u64,
        actual: u64,
    },

    /// The tracking record for an in-flight order is gone (expired or
    /// never initialized). Callers mid-orchestration cannot recover
    /// from this.
    #[error("Tracking record not found for order {0}")]
    MissingRecord(OrderId),

    /// A merge addressed a restaurant that was not part of the order
    /// when tracking was initialized.
    #[error("Order {order_id} has no tracking sub-record for restaurant {restaurant_id}")]
    UnknownRestaurant {
        order_id: OrderId,
        restaurant_id: RestaurantId,
    },

    /// A merge kept losing the version race and gave up.
    #[error("Gave up merging tracking record for order {order_id} after {attempts} attempts")]
    MergeContention { order_id: OrderId, attempts: u32 },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
