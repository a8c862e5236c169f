use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use common::{OrderId, OrderStatus, RestaurantId};
use tracking::{InMemoryCache, RestaurantPatch, TrackingStore};

const TTL: Duration = Duration::from_secs(3600);

fn bench_init_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("tracking/init_order_3_restaurants", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = TrackingStore::new(Arc::new(InMemoryCache::new()), TTL, TTL);
                let restaurants = [
                    RestaurantId::new(),
                    RestaurantId::new(),
                    RestaurantId::new(),
                ];
                store.init_order(OrderId::new(), restaurants).await.unwrap();
            });
        });
    });
}

fn bench_merge_restaurant(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = TrackingStore::new(Arc::new(InMemoryCache::new()), TTL, TTL);
    let order_id = OrderId::new();
    let restaurant_id = RestaurantId::new();

    rt.block_on(async {
        store.init_order(order_id, [restaurant_id]).await.unwrap();
    });

    c.bench_function("tracking/merge_restaurant_status", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .merge_restaurant(
                        order_id,
                        restaurant_id,
                        RestaurantPatch::status(OrderStatus::Cooking),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_contended_merges(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("tracking/merge_4_restaurants_concurrently", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = Arc::new(TrackingStore::new(
                    Arc::new(InMemoryCache::new()),
                    TTL,
                    TTL,
                ));
                let order_id = OrderId::new();
                let restaurants: Vec<RestaurantId> =
                    (0..4).map(|_| RestaurantId::new()).collect();
                store
                    .init_order(order_id, restaurants.clone())
                    .await
                    .unwrap();

                let mut tasks = Vec::new();
                for restaurant_id in restaurants {
                    let store = Arc::clone(&store);
                    tasks.push(tokio::spawn(async move {
                        store
                            .merge_restaurant(
                                order_id,
                                restaurant_id,
                                RestaurantPatch::status(OrderStatus::Cooked),
                            )
                            .await
                            .unwrap();
                    }));
                }
                for task in tasks {
                    task.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_init_order,
    bench_merge_restaurant,
    bench_contended_merges
);
criterion_main!(benches);
