//! Translation of provider status vocabularies into [`OrderStatus`].
//!
//! Every provider reports progress in its own words. Each gets a lookup
//! table from canonicalized tokens to our lifecycle, and anything the
//! table does not list is a hard error: guessing at an unknown status
//! would let an order silently stall or skip a phase.

use std::collections::HashMap;

use common::{OrderStatus, ProviderKey};

use crate::{FulfillmentError, Result};

/// Per-provider status translation tables.
#[derive(Debug, Default)]
pub struct StatusNormalizer {
    tables: HashMap<ProviderKey, HashMap<String, OrderStatus>>,
}

impl StatusNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A normalizer pre-loaded with the tables for the providers we
    /// integrate with today.
    pub fn with_defaults() -> Self {
        let mut normalizer = Self::new();
        for provider in ["kfc", "silpo"] {
            normalizer.register(ProviderKey::new(provider), restaurant_table());
        }
        for provider in ["uklon", "uber"] {
            normalizer.register(ProviderKey::new(provider), delivery_table());
        }
        normalizer
    }

    /// Installs (or replaces) the translation table for a provider.
    pub fn register(&mut self, provider: ProviderKey, table: HashMap<String, OrderStatus>) {
        self.tables.insert(provider, table);
    }

    /// Maps a raw provider status onto our lifecycle.
    ///
    /// The raw value is canonicalized first (trimmed, lowercased, spaces
    /// and hyphens folded to underscores), so "Not Started", "not-started"
    /// and "NOT_STARTED" all resolve the same way.
    pub fn normalize(&self, provider: &ProviderKey, raw: &str) -> Result<OrderStatus> {
        let token = canonicalize(raw);
        self.tables
            .get(provider)
            .and_then(|table| table.get(&token))
            .copied()
            .ok_or_else(|| {
                metrics::counter!("fulfillment_unrecognized_status_total").increment(1);
                FulfillmentError::UnrecognizedStatus {
                    provider: provider.to_string(),
                    status: raw.to_string(),
                }
            })
    }
}

fn canonicalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn restaurant_table() -> HashMap<String, OrderStatus> {
    HashMap::from([
        ("not_started".to_string(), OrderStatus::NotStarted),
        ("cooking".to_string(), OrderStatus::Cooking),
        ("cooked".to_string(), OrderStatus::Cooked),
        // Some kitchens say "finished" when the food is ready to hand over.
        ("finished".to_string(), OrderStatus::Cooked),
    ])
}

fn delivery_table() -> HashMap<String, OrderStatus> {
    HashMap::from([
        ("not_started".to_string(), OrderStatus::NotStarted),
        ("delivery".to_string(), OrderStatus::Delivery),
        ("delivered".to_string(), OrderStatus::Delivered),
    ])
}
