//! Restaurant catalog endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::OrderStore;
use serde::Serialize;
use tracking::CacheStore;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct RestaurantResponse {
    pub id: String,
    pub name: String,
    pub address: String,
    pub provider: String,
    pub dishes: Vec<DishResponse>,
}

#[derive(Serialize)]
pub struct DishResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
}

/// GET /restaurants: catalog listing with each restaurant's menu.
#[tracing::instrument(skip(state))]
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<Vec<RestaurantResponse>>, ApiError>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let restaurants = state.orders.list_restaurants().await?;

    let mut responses = Vec::with_capacity(restaurants.len());
    for restaurant in restaurants {
        let dishes = state
            .orders
            .list_dishes(restaurant.id)
            .await?
            .into_iter()
            .map(|dish| DishResponse {
                id: dish.id.to_string(),
                name: dish.name,
                price_cents: dish.price.cents(),
            })
            .collect();

        responses.push(RestaurantResponse {
            id: restaurant.id.to_string(),
            name: restaurant.name,
            address: restaurant.address,
            provider: restaurant.provider.to_string(),
            dishes,
        });
    }

    Ok(Json(responses))
}
