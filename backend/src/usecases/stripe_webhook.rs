use std::sync::Arc;

use anyhow::anyhow;
use crates::{
    delivery::google_form::DeliveryPayload,
    domain::{repositories::deliveries::DeliveryLedger, value_objects::orders::Order},
    payments::stripe_client::StripeClient,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::usecases::{
    checkout::StripeGateway,
    delivery::{DeliveryAdapter, DeliveryService},
};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("{0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            // A 5xx tells Stripe to redeliver the event later.
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Signature-verified webhook receiver. Confirmed payments are forwarded
/// downstream exactly once per intent, no matter how often Stripe
/// redelivers the event.
pub struct StripeWebhookUseCase<Stripe, D, L>
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    stripe_client: Arc<Stripe>,
    delivery: Arc<DeliveryService<D, L>>,
}

impl<Stripe, D, L> StripeWebhookUseCase<Stripe, D, L>
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    pub fn new(stripe_client: Arc<Stripe>, delivery: Arc<DeliveryService<D, L>>) -> Self {
        Self {
            stripe_client,
            delivery,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), WebhookError> {
        // Nothing in the payload is trusted until the signature checks out.
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature_header)
            .map_err(|err| {
                warn!(
                    error = ?err,
                    "stripe webhook: signature verification failed"
                );
                WebhookError::InvalidWebhook("invalid webhook signature".to_string())
            })?;

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            livemode = ?event.livemode,
            "stripe webhook: event received"
        );

        match event.type_.as_str() {
            "payment_intent.succeeded" => self.handle_payment_intent_succeeded(&event).await,
            "checkout.session.completed" => self.handle_checkout_session_completed(&event).await,
            other => {
                debug!(event_type = %other, "stripe webhook: ignoring unhandled event type");
                Ok(())
            }
        }
    }

    async fn handle_payment_intent_succeeded(
        &self,
        event: &crates::payments::stripe_client::StripeEvent,
    ) -> Result<(), WebhookError> {
        let intent = StripeClient::extract_payment_intent(event).ok_or_else(|| {
            error!(
                event_id = ?event.id,
                "stripe webhook: event object is not a payment intent"
            );
            WebhookError::Internal(anyhow!("event object is not a payment intent"))
        })?;

        let order = Order::from_metadata(&intent.metadata).map_err(|err| {
            error!(
                payment_intent_id = %intent.id,
                error = ?err,
                "stripe webhook: intent metadata does not reconstruct an order"
            );
            WebhookError::Internal(err)
        })?;

        let payload = DeliveryPayload::new(order, intent.id.clone(), intent.amount);
        self.delivery.deliver_once(&payload).await.map_err(|err| {
            error!(
                payment_intent_id = %intent.id,
                error = ?err,
                "stripe webhook: downstream delivery failed"
            );
            WebhookError::Internal(err)
        })?;

        Ok(())
    }

    /// Redirect-checkout variant of the same confirmation. The session
    /// carries its own metadata copy and the settled total.
    async fn handle_checkout_session_completed(
        &self,
        event: &crates::payments::stripe_client::StripeEvent,
    ) -> Result<(), WebhookError> {
        let session = StripeClient::extract_checkout_session(event).ok_or_else(|| {
            error!(
                event_id = ?event.id,
                "stripe webhook: event object is not a checkout session"
            );
            WebhookError::Internal(anyhow!("event object is not a checkout session"))
        })?;

        let payment_intent_id = session.payment_intent.clone().ok_or_else(|| {
            error!(
                session_id = ?session.id,
                "stripe webhook: checkout session has no payment intent"
            );
            WebhookError::Internal(anyhow!("checkout session has no payment intent"))
        })?;

        let metadata = session.metadata.unwrap_or_default();
        let order = Order::from_metadata(&metadata).map_err(|err| {
            error!(
                payment_intent_id = %payment_intent_id,
                error = ?err,
                "stripe webhook: session metadata does not reconstruct an order"
            );
            WebhookError::Internal(err)
        })?;

        let amount_minor = session
            .amount_total
            .unwrap_or_else(|| order.plan_type.config().price_minor);

        let payload = DeliveryPayload::new(order, payment_intent_id.clone(), amount_minor);
        self.delivery.deliver_once(&payload).await.map_err(|err| {
            error!(
                payment_intent_id = %payment_intent_id,
                error = ?err,
                "stripe webhook: downstream delivery failed"
            );
            WebhookError::Internal(err)
        })?;

        Ok(())
    }
}
