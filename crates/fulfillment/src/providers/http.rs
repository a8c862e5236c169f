//! HTTP implementation of [`ProviderClient`].
//!
//! Kitchens expose `POST /api/orders` and `GET /api/orders/{id}`,
//! couriers `POST /drivers/orders` and `GET /drivers/orders/{id}`. Both
//! answer with the provider order id, a raw status string and, for
//! couriers, the rider's current location as a `[lat, lon]` pair.

use common::{GeoPoint, ProviderKey, ProviderRole};
use serde::{Deserialize, Serialize};

use crate::providers::{OrderLine, PlacedOrder, ProviderClient, ProviderRequest, StatusSnapshot};
use crate::{FulfillmentError, Result};

pub struct HttpProviderClient {
    http: reqwest::Client,
    provider: ProviderKey,
    role: ProviderRole,
    base_url: String,
}

impl HttpProviderClient {
    pub fn new(provider: ProviderKey, role: ProviderRole, base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), provider, role, base_url)
    }

    /// Builds a client around a preconfigured [`reqwest::Client`], e.g.
    /// one with custom timeouts shared across providers.
    pub fn with_client(
        http: reqwest::Client,
        provider: ProviderKey,
        role: ProviderRole,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            provider,
            role,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn orders_url(&self) -> String {
        match self.role {
            ProviderRole::Restaurant => format!("{}/api/orders", self.base_url),
            ProviderRole::Delivery => format!("{}/drivers/orders", self.base_url),
        }
    }

    fn external_call(&self, err: reqwest::Error) -> FulfillmentError {
        FulfillmentError::ExternalCall {
            provider: self.provider.to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct RestaurantOrderBody<'a> {
    order: &'a [OrderLine],
}

#[derive(Serialize)]
struct DeliveryOrderBody<'a> {
    addresses: &'a [String],
    comments: &'a [String],
}

#[derive(Deserialize)]
struct ProviderOrderBody {
    id: String,
    status: String,
    #[serde(default)]
    location: Option<(f64, f64)>,
}

impl ProviderOrderBody {
    fn location(&self) -> Option<GeoPoint> {
        self.location
            .map(|(latitude, longitude)| GeoPoint::new(latitude, longitude))
    }
}

#[async_trait::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn create_order(&self, request: ProviderRequest) -> Result<PlacedOrder> {
        let builder = match &request {
            ProviderRequest::Restaurant { items } => self
                .http
                .post(self.orders_url())
                .json(&RestaurantOrderBody { order: items }),
            ProviderRequest::Delivery {
                addresses,
                comments,
            } => self.http.post(self.orders_url()).json(&DeliveryOrderBody {
                addresses,
                comments,
            }),
        };

        let body: ProviderOrderBody = builder
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.external_call(err))?
            .json()
            .await
            .map_err(|err| self.external_call(err))?;

        tracing::debug!(
            provider = %self.provider,
            external_id = %body.id,
            status = %body.status,
            "order placed with provider"
        );
        Ok(PlacedOrder {
            location: body.location(),
            external_id: body.id,
            status: body.status,
        })
    }

    async fn get_order(&self, external_id: &str) -> Result<StatusSnapshot> {
        let url = format!("{}/{}", self.orders_url(), external_id);
        let body: ProviderOrderBody = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.external_call(err))?
            .json()
            .await
            .map_err(|err| self.external_call(err))?;

        Ok(StatusSnapshot {
            location: body.location(),
            status: body.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restaurant_body_matches_kitchen_wire_format() {
        let items = vec![
            OrderLine {
                dish: "Burger".to_string(),
                quantity: 2,
            },
            OrderLine {
                dish: "Fries".to_string(),
                quantity: 1,
            },
        ];
        let body = serde_json::to_value(RestaurantOrderBody { order: &items }).unwrap();
        assert_eq!(
            body,
            json!({
                "order": [
                    { "dish": "Burger", "quantity": 2 },
                    { "dish": "Fries", "quantity": 1 },
                ]
            })
        );
    }

    #[test]
    fn delivery_body_matches_courier_wire_format() {
        let addresses = vec!["Kitchen A".to_string(), "Customer".to_string()];
        let comments = vec!["Pick up at Kitchen A".to_string()];
        let body = serde_json::to_value(DeliveryOrderBody {
            addresses: &addresses,
            comments: &comments,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "addresses": ["Kitchen A", "Customer"],
                "comments": ["Pick up at Kitchen A"],
            })
        );
    }

    #[test]
    fn response_location_pair_becomes_geo_point() {
        let body: ProviderOrderBody = serde_json::from_value(json!({
            "id": "drv-17",
            "status": "delivery",
            "location": [50.4501, 30.5234],
        }))
        .unwrap();
        assert_eq!(
            body.location(),
            Some(GeoPoint::new(50.4501, 30.5234))
        );

        // Kitchens answer without a location at all.
        let body: ProviderOrderBody =
            serde_json::from_value(json!({ "id": "k-1", "status": "cooking" })).unwrap();
        assert_eq!(body.location(), None);
    }
}
