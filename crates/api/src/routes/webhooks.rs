//! Inbound provider status callbacks.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use common::ProviderKey;
use domain::OrderStore;
use fulfillment::{WebhookOutcome, WebhookUpdate};
use tracking::CacheStore;

use crate::error::ApiError;
use crate::routes::orders::AppState;

/// POST /webhooks/{provider}/{token}: status callback from an
/// external provider.
///
/// The token is a static secret baked into the callback URL each
/// provider was given. Unknown providers and wrong tokens both answer
/// 404, so probing the path space reveals nothing. A valid callback
/// whose external id maps to no known order answers 410: the order is
/// gone for good and the provider should stop retrying.
#[tracing::instrument(skip(state, token, update), fields(provider = %provider))]
pub async fn receive<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((provider, token)): Path<(String, String)>,
    Json(update): Json<WebhookUpdate>,
) -> Result<StatusCode, ApiError>
where
    S: OrderStore + 'static,
    C: CacheStore + 'static,
{
    let key = ProviderKey::new(&provider);
    let authorized = state
        .webhook_tokens
        .get(&key)
        .is_some_and(|expected| *expected == token);
    if !authorized {
        metrics::counter!("api_webhook_rejected_total").increment(1);
        tracing::warn!(provider = %key, "rejected webhook with bad provider or token");
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    match state.webhooks.process(&key, update).await? {
        WebhookOutcome::Applied => Ok(StatusCode::NO_CONTENT),
        WebhookOutcome::UnknownOrder => Ok(StatusCode::GONE),
    }
}
