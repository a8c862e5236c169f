//! Cache-backed tracking state for in-flight orders.
//!
//! This crate provides the ephemeral side of order fulfillment:
//! - CacheStore trait for TTL-bound, versioned JSON entries
//! - InMemoryCache implementation
//! - TrackingRecord with per-restaurant and delivery sub-records
//! - TrackingStore with atomic field-level merges and external order
//!   mappings for webhook providers

pub mod cache;
pub mod error;
pub mod memory;
pub mod record;
pub mod store;

pub use cache::{CacheEntry, CacheStore, VERSION_NONE};
pub use error::{Result, TrackingError};
pub use memory::InMemoryCache;
pub use record::{DeliveryPatch, DeliverySubRecord, RestaurantPatch, RestaurantSubRecord, TrackingRecord};
pub use store::{ExternalOrderMapping, TrackingStore};
