//! HTTP surface of the catering fulfillment service.
//!
//! Exposes order intake, order and tracking reads, the restaurant
//! catalog, per-provider webhook callbacks, plus health and Prometheus
//! metrics routes, with structured logging (tracing) throughout.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use common::{ProviderKey, ProviderRole};
use domain::{Dish, Money, OrderStore, Restaurant, StoreError};
use fulfillment::{
    FulfillmentCoordinator, HttpProviderClient, ProviderRegistry, StatusNormalizer, UpdateStrategy,
    WebhookProcessor,
};
use tracking::{CacheStore, InMemoryCache, TrackingStore};

pub use config::Config;
pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, C>))
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route("/orders/{id}/tracking", get(routes::orders::tracking::<S, C>))
        .route("/restaurants", get(routes::restaurants::list::<S, C>))
        .route(
            "/webhooks/{provider}/{token}",
            post(routes::webhooks::receive::<S, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the application state around an order store and a provider
/// registry: in-memory tracking cache, coordinator, webhook processor.
pub fn create_state<S: OrderStore + 'static>(
    orders: Arc<S>,
    providers: ProviderRegistry,
    config: &Config,
) -> Arc<AppState<S, InMemoryCache>> {
    let tracking = Arc::new(TrackingStore::new(
        Arc::new(InMemoryCache::new()),
        config.order_ttl(),
        config.mapping_ttl(),
    ));
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        Arc::clone(&orders),
        Arc::clone(&tracking),
        Arc::new(providers),
        Arc::new(StatusNormalizer::with_defaults()),
        config.fulfillment(),
    ));
    let webhooks = WebhookProcessor::new(Arc::clone(&coordinator));

    Arc::new(AppState {
        orders,
        tracking,
        coordinator,
        webhooks,
        webhook_tokens: config.webhook_tokens(),
    })
}

/// Builds the reqwest-backed provider registry used in production:
/// KFC and Uber call back over webhooks, Silpo and Uklon are polled.
pub fn http_providers(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    let entries = [
        (
            "kfc",
            ProviderRole::Restaurant,
            UpdateStrategy::Webhook,
            config.kfc_api_url.as_str(),
        ),
        (
            "silpo",
            ProviderRole::Restaurant,
            UpdateStrategy::Polling,
            config.silpo_api_url.as_str(),
        ),
        (
            "uklon",
            ProviderRole::Delivery,
            UpdateStrategy::Polling,
            config.uklon_api_url.as_str(),
        ),
        (
            "uber",
            ProviderRole::Delivery,
            UpdateStrategy::Webhook,
            config.uber_api_url.as_str(),
        ),
    ];
    for (name, role, strategy, base_url) in entries {
        let key = ProviderKey::new(name);
        registry.register(
            key.clone(),
            role,
            strategy,
            Arc::new(HttpProviderClient::new(key, role, base_url)),
        );
    }

    registry
}

/// Seeds a small restaurant catalog when the store has none, so a
/// fresh in-memory instance can take orders right away.
pub async fn seed_demo_catalog<S: OrderStore>(store: &S) -> Result<(), StoreError> {
    if !store.list_restaurants().await?.is_empty() {
        return Ok(());
    }

    let kfc = Restaurant::new("KFC", "Velyka Vasylkivska 100", ProviderKey::new("kfc"));
    let silpo = Restaurant::new("Silpo", "Heroiv Dnipra 32", ProviderKey::new("silpo"));
    store.add_restaurant(&kfc).await?;
    store.add_restaurant(&silpo).await?;

    for (restaurant, name, cents) in [
        (&kfc, "Hot Wings", 899),
        (&kfc, "Zinger Burger", 650),
        (&silpo, "Olivier Salad", 450),
        (&silpo, "Borscht", 520),
    ] {
        store
            .add_dish(&Dish::new(restaurant.id, name, Money::from_cents(cents)))
            .await?;
    }

    tracing::info!("seeded demo restaurant catalog");
    Ok(())
}
