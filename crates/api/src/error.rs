//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, StoreError};
use fulfillment::FulfillmentError;
use tracking::TrackingError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order validation error.
    Domain(DomainError),
    /// Orchestration error.
    Fulfillment(FulfillmentError),
    /// Durable store error.
    Store(StoreError),
    /// Tracking cache error.
    Tracking(TrackingError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Tracking(err) => tracking_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match err {
        FulfillmentError::Tracking(inner) => tracking_error_to_response(inner),
        FulfillmentError::Store(inner) => store_error_to_response(inner),
        other => {
            let status = match &other {
                FulfillmentError::UnsupportedProvider(_) => StatusCode::UNPROCESSABLE_ENTITY,
                FulfillmentError::UnrecognizedStatus { .. }
                | FulfillmentError::NothingToDispatch(_) => StatusCode::BAD_REQUEST,
                FulfillmentError::OrderNotFound(_) | FulfillmentError::RestaurantNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, other.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    let status = match &err {
        StoreError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn tracking_error_to_response(err: TrackingError) -> (StatusCode, String) {
    let status = match &err {
        TrackingError::MissingRecord(_) => StatusCode::NOT_FOUND,
        TrackingError::VersionConflict { .. } | TrackingError::MergeContention { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        ApiError::Tracking(err)
    }
}
