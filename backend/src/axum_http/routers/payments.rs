use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::repositories::deliveries::DeliveryLedger;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::usecases::{
    checkout::{CheckoutUseCase, CreatePaymentIntentRequest, StripeGateway},
    delivery::DeliveryAdapter,
};

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(rename = "paymentIntentId")]
    pub payment_intent_id: String,
}

/// Publishable-key handout for the browser-side payment element. The
/// secret key and webhook secret never pass through here.
#[derive(Debug, Clone, Serialize)]
pub struct PublicConfigResponse {
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

pub fn routes<Stripe, D, L>(
    usecase: Arc<CheckoutUseCase<Stripe, D, L>>,
    public_key: String,
) -> Router
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/confirm-payment", post(confirm_payment))
        .with_state(usecase)
        .merge(
            Router::new()
                .route("/config", get(public_config))
                .with_state(PublicConfigResponse { public_key }),
        )
}

pub async fn create_payment_intent<Stripe, D, L>(
    State(usecase): State<Arc<CheckoutUseCase<Stripe, D, L>>>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Response
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    match usecase.create_payment_intent(request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn confirm_payment<Stripe, D, L>(
    State(usecase): State<Arc<CheckoutUseCase<Stripe, D, L>>>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Response
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    info!(
        payment_intent_id = %request.payment_intent_id,
        "payments: confirm_payment received"
    );
    match usecase.verify_payment(&request.payment_intent_id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn public_config(State(config): State<PublicConfigResponse>) -> Response {
    Json(config).into_response()
}
