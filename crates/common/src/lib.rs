//! Shared types for the order fulfillment system.
//!
//! Identifier newtypes, the provider vocabulary and the coarse order
//! status machine used by every other crate in the workspace.

pub mod status;
pub mod types;

pub use status::OrderStatus;
pub use types::{GeoPoint, OrderId, ProviderKey, ProviderRole, RestaurantId};
