//! Clients for the external services that cook and deliver orders.
//!
//! Every provider, kitchen or courier, speaks the same two-call
//! contract: place an order, then read its status until it reaches a
//! terminal state. How fresh status arrives differs per provider and is
//! captured by [`UpdateStrategy`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use common::{GeoPoint, ProviderKey, ProviderRole};

use crate::{FulfillmentError, Result};

pub mod http;
pub mod mock;

pub use http::HttpProviderClient;
pub use mock::MockProviderClient;

/// One dish line of a restaurant order, in provider vocabulary.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OrderLine {
    pub dish: String,
    pub quantity: u32,
}

/// What gets sent to a provider when placing an order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    /// A kitchen gets the dish lines it has to cook.
    Restaurant { items: Vec<OrderLine> },
    /// A courier gets pickup addresses and rider instructions.
    Delivery {
        addresses: Vec<String>,
        comments: Vec<String>,
    },
}

/// A provider's acknowledgement of a newly placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    /// The id the provider assigned; all later lookups use it.
    pub external_id: String,
    /// Raw provider status, not yet normalized.
    pub status: String,
    pub location: Option<GeoPoint>,
}

/// A provider's answer to a status poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: String,
    pub location: Option<GeoPoint>,
}

/// The two-call contract every provider integration implements.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Places an order with the provider.
    async fn create_order(&self, request: ProviderRequest) -> Result<PlacedOrder>;

    /// Reads the current status of a previously placed order.
    async fn get_order(&self, external_id: &str) -> Result<StatusSnapshot>;
}

/// How a provider reports progress after the order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// We ask: a worker polls `get_order` on an interval.
    Polling,
    /// They tell: the provider calls our webhook endpoint.
    Webhook,
}

/// A registered provider: its client plus how we talk to it.
#[derive(Clone)]
pub struct ProviderEntry {
    pub client: Arc<dyn ProviderClient>,
    pub role: ProviderRole,
    pub strategy: UpdateStrategy,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("role", &self.role)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Lookup of provider clients by key, checked against the role the
/// caller needs. Asking for an unregistered provider, or one registered
/// for the other role, is a configuration error and fails fast.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: HashMap<ProviderKey, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: ProviderKey,
        role: ProviderRole,
        strategy: UpdateStrategy,
        client: Arc<dyn ProviderClient>,
    ) {
        self.entries.insert(
            provider,
            ProviderEntry {
                client,
                role,
                strategy,
            },
        );
    }

    /// Resolves a kitchen provider.
    pub fn restaurant(&self, provider: &ProviderKey) -> Result<&ProviderEntry> {
        self.entry(provider, ProviderRole::Restaurant)
    }

    /// Resolves a courier provider.
    pub fn delivery(&self, provider: &ProviderKey) -> Result<&ProviderEntry> {
        self.entry(provider, ProviderRole::Delivery)
    }

    /// Resolves a provider in whatever role it was registered with.
    pub fn get(&self, provider: &ProviderKey) -> Option<&ProviderEntry> {
        self.entries.get(provider)
    }

    fn entry(&self, provider: &ProviderKey, role: ProviderRole) -> Result<&ProviderEntry> {
        self.entries
            .get(provider)
            .filter(|entry| entry.role == role)
            .ok_or_else(|| FulfillmentError::UnsupportedProvider(provider.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_silpo_and_uklon() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderKey::new("silpo"),
            ProviderRole::Restaurant,
            UpdateStrategy::Polling,
            Arc::new(MockProviderClient::restaurant("silpo")),
        );
        registry.register(
            ProviderKey::new("uklon"),
            ProviderRole::Delivery,
            UpdateStrategy::Polling,
            Arc::new(MockProviderClient::delivery("uklon")),
        );
        registry
    }

    #[test]
    fn resolves_by_role() {
        let registry = registry_with_silpo_and_uklon();

        let entry = registry.restaurant(&ProviderKey::new("silpo")).unwrap();
        assert_eq!(entry.role, ProviderRole::Restaurant);
        assert_eq!(entry.strategy, UpdateStrategy::Polling);

        assert!(registry.delivery(&ProviderKey::new("uklon")).is_ok());
    }

    #[test]
    fn unregistered_provider_is_unsupported() {
        let registry = registry_with_silpo_and_uklon();
        let err = registry
            .restaurant(&ProviderKey::new("mcdonalds"))
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::UnsupportedProvider(name) if name == "mcdonalds"));
    }

    #[test]
    fn wrong_role_is_unsupported() {
        let registry = registry_with_silpo_and_uklon();
        // A kitchen cannot be asked to deliver.
        assert!(matches!(
            registry.delivery(&ProviderKey::new("silpo")),
            Err(FulfillmentError::UnsupportedProvider(_))
        ));
        assert!(matches!(
            registry.restaurant(&ProviderKey::new("uklon")),
            Err(FulfillmentError::UnsupportedProvider(_))
        ));
        // Role-agnostic lookup still finds both.
        assert!(registry.get(&ProviderKey::new("silpo")).is_some());
        assert!(registry.get(&ProviderKey::new("uklon")).is_some());
    }
}
