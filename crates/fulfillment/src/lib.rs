//! Order fulfillment orchestration.
//!
//! This crate drives a placed order through its whole lifecycle:
//! 1. Fan the order out to its restaurants, one worker each.
//! 2. Follow every kitchen to cooked, by polling or webhooks.
//! 3. Once all kitchens are done, book a courier exactly once.
//! 4. Follow the ride to delivered.
//!
//! Progress lives in the tracking store; the coarse order status moves
//! through compare-and-set transitions, so concurrent workers, webhook
//! callbacks and replays never double-book or move an order backwards.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod normalizer;
pub mod providers;
pub mod webhook;
pub mod worker;

pub use config::{FulfillmentConfig, RetryPolicy};
pub use coordinator::FulfillmentCoordinator;
pub use error::{FulfillmentError, Result};
pub use jobs::{JobKey, JobRegistry};
pub use normalizer::StatusNormalizer;
pub use providers::{
    HttpProviderClient, MockProviderClient, OrderLine, PlacedOrder, ProviderClient, ProviderEntry,
    ProviderRegistry, ProviderRequest, StatusSnapshot, UpdateStrategy,
};
pub use webhook::{WebhookOutcome, WebhookProcessor, WebhookUpdate};
