//! End-to-end fulfillment tests against scripted providers.
//!
//! These run the real coordinator, workers and dispatcher over the
//! in-memory order store and cache, with every external provider
//! replaced by a [`MockProviderClient`]. Time is paused, so polling
//! intervals elapse instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use common::{GeoPoint, OrderId, OrderStatus, ProviderKey, ProviderRole, RestaurantId};
use domain::store::Result as StoreResult;
use domain::{
    CustomerId, Dish, DishId, InMemoryOrderStore, Money, Order, OrderItem, OrderStore, Restaurant,
};
use fulfillment::{
    FulfillmentConfig, FulfillmentCoordinator, MockProviderClient, ProviderClient,
    ProviderRegistry, StatusNormalizer, UpdateStrategy, WebhookOutcome, WebhookProcessor,
    WebhookUpdate,
};
use tracking::{InMemoryCache, TrackingStore};

/// Order store wrapper that records the target of every transition it
/// actually applied, so tests can assert the exact persisted lifecycle.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryOrderStore,
    transitions: Mutex<Vec<OrderStatus>>,
}

impl RecordingStore {
    fn applied_transitions(&self) -> Vec<OrderStatus> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderStore for RecordingStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        self.inner.insert_order(order).await
    }

    async fn get_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        self.inner.get_order(order_id).await
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let applied = self.inner.transition_status(order_id, from, to).await?;
        if applied {
            self.transitions.lock().unwrap().push(to);
        }
        Ok(applied)
    }

    async fn add_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        self.inner.add_restaurant(restaurant).await
    }

    async fn get_restaurant(&self, restaurant_id: RestaurantId) -> StoreResult<Option<Restaurant>> {
        self.inner.get_restaurant(restaurant_id).await
    }

    async fn list_restaurants(&self) -> StoreResult<Vec<Restaurant>> {
        self.inner.list_restaurants().await
    }

    async fn add_dish(&self, dish: &Dish) -> StoreResult<()> {
        self.inner.add_dish(dish).await
    }

    async fn get_dish(&self, dish_id: DishId) -> StoreResult<Option<Dish>> {
        self.inner.get_dish(dish_id).await
    }

    async fn list_dishes(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<Dish>> {
        self.inner.list_dishes(restaurant_id).await
    }
}

struct Harness {
    coordinator: Arc<FulfillmentCoordinator<RecordingStore, InMemoryCache>>,
    store: Arc<RecordingStore>,
    tracking: Arc<TrackingStore<InMemoryCache>>,
    kfc: Arc<MockProviderClient>,
    silpo: Arc<MockProviderClient>,
    uklon: Arc<MockProviderClient>,
    uber: Arc<MockProviderClient>,
    kfc_rest: Restaurant,
    silpo_rest: Restaurant,
}

/// Two kitchens and two couriers. KFC and Uber take the strategies the
/// test asks for; Silpo and Uklon always poll.
async fn harness(kfc_strategy: UpdateStrategy, uber_strategy: UpdateStrategy) -> Harness {
    let store = Arc::new(RecordingStore::default());
    let tracking = Arc::new(TrackingStore::new(
        Arc::new(InMemoryCache::new()),
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    ));

    let kfc = Arc::new(MockProviderClient::restaurant("kfc"));
    let silpo = Arc::new(MockProviderClient::restaurant("silpo"));
    let uklon = Arc::new(MockProviderClient::delivery("uklon"));
    let uber = Arc::new(MockProviderClient::delivery("uber"));

    let mut registry = ProviderRegistry::new();
    registry.register(
        ProviderKey::new("kfc"),
        ProviderRole::Restaurant,
        kfc_strategy,
        Arc::clone(&kfc) as Arc<dyn ProviderClient>,
    );
    registry.register(
        ProviderKey::new("silpo"),
        ProviderRole::Restaurant,
        UpdateStrategy::Polling,
        Arc::clone(&silpo) as Arc<dyn ProviderClient>,
    );
    registry.register(
        ProviderKey::new("uklon"),
        ProviderRole::Delivery,
        UpdateStrategy::Polling,
        Arc::clone(&uklon) as Arc<dyn ProviderClient>,
    );
    registry.register(
        ProviderKey::new("uber"),
        ProviderRole::Delivery,
        uber_strategy,
        Arc::clone(&uber) as Arc<dyn ProviderClient>,
    );

    let kfc_rest = Restaurant::new("KFC", "Velyka Vasylkivska 100", ProviderKey::new("kfc"));
    let silpo_rest = Restaurant::new("Silpo", "Heroiv Dnipra 32", ProviderKey::new("silpo"));
    store.add_restaurant(&kfc_rest).await.unwrap();
    store.add_restaurant(&silpo_rest).await.unwrap();

    let coordinator = Arc::new(FulfillmentCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&tracking),
        Arc::new(registry),
        Arc::new(StatusNormalizer::with_defaults()),
        FulfillmentConfig::default(),
    ));

    Harness {
        coordinator,
        store,
        tracking,
        kfc,
        silpo,
        uklon,
        uber,
        kfc_rest,
        silpo_rest,
    }
}

fn order_from_both_kitchens(h: &Harness, courier: &str) -> Order {
    let items = vec![
        OrderItem::new(
            DishId::new(),
            h.kfc_rest.id,
            "Hot Wings",
            2,
            Money::from_cents(899),
        ),
        OrderItem::new(
            DishId::new(),
            h.silpo_rest.id,
            "Olivier Salad",
            1,
            Money::from_cents(450),
        ),
    ];
    Order::place(
        CustomerId::new(),
        items,
        NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
        courier,
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
    )
    .unwrap()
}

fn order_from_kfc_only(h: &Harness, courier: &str) -> Order {
    let items = vec![OrderItem::new(
        DishId::new(),
        h.kfc_rest.id,
        "Zinger Burger",
        1,
        Money::from_cents(650),
    )];
    Order::place(
        CustomerId::new(),
        items,
        NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
        courier,
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
    )
    .unwrap()
}

async fn drain_jobs(coordinator: &Arc<FulfillmentCoordinator<RecordingStore, InMemoryCache>>) {
    while coordinator.active_jobs().await != 0 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn two_kitchens_poll_to_delivered_end_to_end() {
    let h = harness(UpdateStrategy::Polling, UpdateStrategy::Polling).await;
    h.kfc.script_poll("finished");
    h.silpo.script_poll("cooking");
    h.silpo.script_poll("cooked");
    let en_route = GeoPoint::new(50.4501, 30.5234);
    let at_the_door = GeoPoint::new(50.4547, 30.5238);
    h.uklon.script_poll_at("delivery", en_route);
    h.uklon.script_poll_at("delivered", at_the_door);

    let order = order_from_both_kitchens(&h, "uklon");
    h.store.insert_order(&order).await.unwrap();
    Arc::clone(&h.coordinator)
        .schedule_order(&order)
        .await
        .unwrap();
    drain_jobs(&h.coordinator).await;

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Delivered);
    assert_eq!(
        h.store.applied_transitions(),
        vec![
            OrderStatus::Cooking,
            OrderStatus::Cooked,
            OrderStatus::DeliveryLookup,
            OrderStatus::Delivery,
            OrderStatus::Delivered,
        ],
    );

    // One external order per kitchen, one ride, and nothing sent to
    // the courier that wasn't asked for.
    assert_eq!(h.kfc.create_count(), 1);
    assert_eq!(h.silpo.create_count(), 1);
    assert_eq!(h.uklon.create_count(), 1);
    assert_eq!(h.uber.create_count(), 0);

    let record = h.tracking.load(order.id).await.unwrap();
    assert_eq!(
        record.restaurant(&h.kfc_rest.id).unwrap().status,
        OrderStatus::Cooked
    );
    assert_eq!(
        record.restaurant(&h.silpo_rest.id).unwrap().status,
        OrderStatus::Cooked
    );
    assert_eq!(record.delivery.status, OrderStatus::Delivered);
    assert_eq!(record.delivery.location, Some(at_the_door));

    // A straggling completion signal after the fact changes nothing.
    h.coordinator
        .on_restaurant_status_changed(order.id)
        .await
        .unwrap();
    drain_jobs(&h.coordinator).await;
    assert_eq!(h.uklon.create_count(), 1);
    assert_eq!(h.store.applied_transitions().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn webhook_driven_kitchen_and_courier_reach_delivered() {
    let h = harness(UpdateStrategy::Webhook, UpdateStrategy::Webhook).await;
    h.kfc.set_create_status("cooking");

    let order = order_from_kfc_only(&h, "uber");
    h.store.insert_order(&order).await.unwrap();
    Arc::clone(&h.coordinator)
        .schedule_order(&order)
        .await
        .unwrap();
    drain_jobs(&h.coordinator).await;

    // The worker placed the order, saw "cooking" and got out of the way.
    assert_eq!(h.store.applied_transitions(), vec![OrderStatus::Cooking]);
    let processor = WebhookProcessor::new(Arc::clone(&h.coordinator));
    let kfc_key = ProviderKey::new("kfc");
    let uber_key = ProviderKey::new("uber");

    // KFC reports the sub-order done; that books the Uber ride.
    let outcome = processor
        .process(
            &kfc_key,
            WebhookUpdate {
                id: "KFC-0001".to_string(),
                status: "finished".to_string(),
                location: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);
    drain_jobs(&h.coordinator).await;

    assert_eq!(h.uber.create_count(), 1);
    assert_eq!(
        h.store.applied_transitions(),
        vec![
            OrderStatus::Cooking,
            OrderStatus::Cooked,
            OrderStatus::DeliveryLookup,
            OrderStatus::Delivery,
        ],
    );

    let en_route = GeoPoint::new(50.4501, 30.5234);
    let dropped_off = GeoPoint::new(50.4547, 30.5238);
    for (status, location) in [("delivery", en_route), ("delivered", dropped_off)] {
        let outcome = processor
            .process(
                &uber_key,
                WebhookUpdate {
                    id: "UBER-0001".to_string(),
                    status: status.to_string(),
                    location: Some(location),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);
    }

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Delivered);
    let record = h.tracking.load(order.id).await.unwrap();
    assert_eq!(record.delivery.external_id.as_deref(), Some("UBER-0001"));
    assert_eq!(record.delivery.location, Some(dropped_off));

    // A duplicate "delivered" webhook is applied but moves nothing.
    let replay = processor
        .process(
            &uber_key,
            WebhookUpdate {
                id: "UBER-0001".to_string(),
                status: "delivered".to_string(),
                location: Some(dropped_off),
            },
        )
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::Applied);
    assert_eq!(h.store.applied_transitions().len(), 5);
    assert_eq!(h.uber.create_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsupported_courier_stalls_after_cooking() {
    let h = harness(UpdateStrategy::Polling, UpdateStrategy::Polling).await;
    h.kfc.script_poll("finished");
    h.silpo.script_poll("cooking");
    h.silpo.script_poll("cooked");

    let order = order_from_both_kitchens(&h, "glovo");
    h.store.insert_order(&order).await.unwrap();
    Arc::clone(&h.coordinator)
        .schedule_order(&order)
        .await
        .unwrap();
    drain_jobs(&h.coordinator).await;

    // Cooking finished, the claim was made, but no courier exists for
    // "glovo" so the order never leaves the lookup phase.
    assert_eq!(
        h.store.applied_transitions(),
        vec![
            OrderStatus::Cooking,
            OrderStatus::Cooked,
            OrderStatus::DeliveryLookup,
        ],
    );
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::DeliveryLookup);
    assert_eq!(h.uklon.create_count(), 0);
    assert_eq!(h.uber.create_count(), 0);

    let record = h.tracking.load(order.id).await.unwrap();
    assert!(record.delivery.external_id.is_none());
}
