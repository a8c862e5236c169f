//! Order intake, read and tracking endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use common::{GeoPoint, OrderId, ProviderKey};
use domain::{CustomerId, DishId, Order, OrderItem, OrderStore};
use fulfillment::{FulfillmentCoordinator, WebhookProcessor};
use tracking::{CacheStore, TrackingStore};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore, C: CacheStore> {
    pub orders: Arc<S>,
    pub tracking: Arc<TrackingStore<C>>,
    pub coordinator: Arc<FulfillmentCoordinator<S, C>>,
    pub webhooks: WebhookProcessor<S, C>,
    /// Expected secret path segment per webhook provider.
    pub webhook_tokens: HashMap<ProviderKey, String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    pub eta: NaiveDate,
    #[serde(default = "default_courier")]
    pub delivery_provider: String,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    /// Dish id from the catalog; the price is looked up server-side.
    pub dish: String,
    pub quantity: u32,
}

fn default_courier() -> String {
    "uklon".to_string()
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub eta: NaiveDate,
    pub delivery_provider: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub dish_id: String,
    pub dish_name: String,
    pub restaurant_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| OrderItemResponse {
                dish_id: item.dish_id.to_string(),
                dish_name: item.dish_name.clone(),
                restaurant_id: item.restaurant_id.to_string(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price.cents(),
            })
            .collect();

        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.as_str().to_string(),
            items,
            total_cents: order.total.cents(),
            eta: order.eta,
            delivery_provider: order.delivery_provider.clone(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub order_id: String,
    pub restaurants: Vec<RestaurantTrackingResponse>,
    pub delivery: DeliveryTrackingResponse,
}

#[derive(Serialize)]
pub struct RestaurantTrackingResponse {
    pub restaurant_id: String,
    pub external_id: Option<String>,
    pub status: String,
}

#[derive(Serialize)]
pub struct DeliveryTrackingResponse {
    pub external_id: Option<String>,
    pub status: String,
    pub location: Option<GeoPoint>,
}

// -- Handlers --

/// POST /orders: validate, price and persist a new order, then hand
/// it to the fulfillment coordinator.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let customer_id = match &req.customer_id {
        Some(raw) => CustomerId::from_uuid(parse_uuid(raw, "customer_id")?),
        None => CustomerId::new(),
    };

    let mut items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let dish_id = DishId::from_uuid(parse_uuid(&item.dish, "dish")?);
        let dish = state
            .orders
            .get_dish(dish_id)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown dish {}", item.dish)))?;
        items.push(OrderItem::new(
            dish.id,
            dish.restaurant_id,
            dish.name,
            item.quantity,
            dish.price,
        ));
    }

    let order = Order::place(
        customer_id,
        items,
        req.eta,
        req.delivery_provider.as_str(),
        Utc::now().date_naive(),
    )?;
    state.orders.insert_order(&order).await?;
    Arc::clone(&state.coordinator).schedule_order(&order).await?;

    metrics::counter!("api_orders_created_total").increment(1);
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}

/// GET /orders/{id}: the persisted order with its coarse status.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /orders/{id}/tracking: live fulfillment state of an in-flight
/// order, per-restaurant cooking progress plus the delivery slot.
#[tracing::instrument(skip(state))]
pub async fn tracking<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<TrackingResponse>, ApiError>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let record = state
        .tracking
        .find(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No tracking state for order {id}")))?;

    let mut restaurants: Vec<RestaurantTrackingResponse> = record
        .restaurants
        .iter()
        .map(|(restaurant_id, sub)| RestaurantTrackingResponse {
            restaurant_id: restaurant_id.to_string(),
            external_id: sub.external_id.clone(),
            status: sub.status.as_str().to_string(),
        })
        .collect();
    restaurants.sort_by(|a, b| a.restaurant_id.cmp(&b.restaurant_id));

    Ok(Json(TrackingResponse {
        order_id: order_id.to_string(),
        restaurants,
        delivery: DeliveryTrackingResponse {
            external_id: record.delivery.external_id.clone(),
            status: record.delivery.status.as_str().to_string(),
            location: record.delivery.location,
        },
    }))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    Ok(OrderId::from_uuid(parse_uuid(id, "order id")?))
}

pub(crate) fn parse_uuid(raw: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|err| ApiError::BadRequest(format!("Invalid {field}: {err}")))
}
