use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::domain::repositories::deliveries::DeliveryLedger;
use tracing::{info, warn};

use crate::axum_http::error_responses::error_response;
use crate::usecases::{
    checkout::StripeGateway, delivery::DeliveryAdapter, stripe_webhook::StripeWebhookUseCase,
};

pub fn routes<Stripe, D, L>(usecase: Arc<StripeWebhookUseCase<Stripe, D, L>>) -> Router
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(receive))
        .with_state(usecase)
}

/// Takes the raw body: the signature covers the exact bytes Stripe sent,
/// so the payload must not go through JSON extraction first.
pub async fn receive<Stripe, D, L>(
    State(usecase): State<Arc<StripeWebhookUseCase<Stripe, D, L>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    let signature = match headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    {
        Some(signature) => signature,
        None => {
            warn!("stripe_webhook: request without a stripe-signature header");
            return error_response(
                StatusCode::BAD_REQUEST,
                "missing stripe-signature header".to_string(),
            );
        }
    };

    info!(
        body_bytes = body.len(),
        "stripe_webhook: event payload received"
    );
    match usecase.handle(&body, signature).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(err) => err.into_response(),
    }
}
