use common::{OrderId, RestaurantId};
use domain::StoreError;
use thiserror::Error;
use tracking::TrackingError;

/// Errors raised while driving an order through cooking and delivery.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A provider reported a status we have no mapping for. Retrying
    /// would produce the same answer, so the worker gives up.
    #[error("provider '{provider}' reported unrecognized status '{status}'")]
    UnrecognizedStatus { provider: String, status: String },

    /// The order references a provider nobody registered a client for.
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(String),

    /// A call to an external provider failed. Transient by assumption,
    /// so this is the one variant workers retry.
    #[error("call to provider '{provider}' failed: {reason}")]
    ExternalCall { provider: String, reason: String },

    /// The order is not in the store.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// An order line references a restaurant that is not in the catalog.
    #[error("restaurant {0} not found")]
    RestaurantNotFound(RestaurantId),

    /// The order has no restaurant lines, so there is nothing to cook.
    #[error("order {0} has no restaurants to dispatch")]
    NothingToDispatch(OrderId),

    /// Tracking state is missing or could not be merged.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// The order store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A provider payload could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FulfillmentError {
    /// Whether a retry with backoff may succeed. Everything except a
    /// failed external call is deterministic and fails the same way
    /// again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FulfillmentError::ExternalCall { .. })
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
