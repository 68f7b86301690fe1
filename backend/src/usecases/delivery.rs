use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::delivery::google_form::{DeliveryPayload, GoogleFormClient};
use crates::domain::repositories::deliveries::DeliveryLedger;
use tracing::{error, info};

/// Downstream delivery port. The webhook receiver and the client
/// verification path both hand confirmed orders to this seam.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryAdapter: Send + Sync {
    async fn deliver(&self, payload: &DeliveryPayload) -> AnyResult<()>;

    /// Prefilled-form URL for the buyer, when the adapter has one.
    fn prefill_url(&self, payload: &DeliveryPayload) -> Option<String>;
}

#[async_trait]
impl DeliveryAdapter for GoogleFormClient {
    async fn deliver(&self, payload: &DeliveryPayload) -> AnyResult<()> {
        self.submit(payload).await
    }

    fn prefill_url(&self, payload: &DeliveryPayload) -> Option<String> {
        Some(GoogleFormClient::prefill_url(self, payload).to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// An earlier webhook delivery or verification call already forwarded
    /// this intent.
    AlreadyDelivered,
}

/// Makes delivery idempotent per payment intent id. Webhook redelivery
/// and a racing client confirmation converge here on one physical
/// submission.
pub struct DeliveryService<D, L>
where
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    adapter: Arc<D>,
    ledger: Arc<L>,
}

impl<D, L> DeliveryService<D, L>
where
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    pub fn new(adapter: Arc<D>, ledger: Arc<L>) -> Self {
        Self { adapter, ledger }
    }

    pub async fn deliver_once(&self, payload: &DeliveryPayload) -> AnyResult<DeliveryOutcome> {
        let claimed = self
            .ledger
            .mark_delivered(&payload.payment_intent_id)
            .await?;

        if !claimed {
            info!(
                payment_intent_id = %payload.payment_intent_id,
                "delivery: intent already forwarded, skipping"
            );
            return Ok(DeliveryOutcome::AlreadyDelivered);
        }

        if let Err(err) = self.adapter.deliver(payload).await {
            // Give the claim back so the processor-driven retry is not
            // suppressed by a failed attempt.
            if let Err(release_err) = self.ledger.release(&payload.payment_intent_id).await {
                error!(
                    payment_intent_id = %payload.payment_intent_id,
                    error = ?release_err,
                    "delivery: failed to release claim after delivery error"
                );
            }
            return Err(err);
        }

        info!(
            payment_intent_id = %payload.payment_intent_id,
            "delivery: order forwarded downstream"
        );
        Ok(DeliveryOutcome::Delivered)
    }

    pub fn prefill_url(&self, payload: &DeliveryPayload) -> Option<String> {
        self.adapter.prefill_url(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::delivery::memory_ledger::InMemoryDeliveryLedger;
    use crates::domain::value_objects::{orders::Order, plans::PlanType};

    fn payload(intent_id: &str) -> DeliveryPayload {
        DeliveryPayload::new(
            Order {
                plan_type: PlanType::Basica,
                para_quien: "Mi madre".to_string(),
                ocasion: "Cumpleaños".to_string(),
                relacion: "Madre e hija".to_string(),
                emociones: vec!["Amor".to_string()],
                detalles: "Detalles".to_string(),
                tono: "Emotivo".to_string(),
                tu_nombre: "Lucía".to_string(),
                email: Some("lucia@example.com".to_string()),
                created_at: Utc::now(),
            },
            intent_id.to_string(),
            99,
        )
    }

    #[tokio::test]
    async fn a_repeated_intent_is_delivered_at_most_once() {
        let mut adapter = MockDeliveryAdapter::new();
        adapter
            .expect_deliver()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let service = Arc::new(DeliveryService::new(
            Arc::new(adapter),
            Arc::new(InMemoryDeliveryLedger::new()),
        ));

        let payload = payload("pi_1");
        assert_eq!(
            service.deliver_once(&payload).await.unwrap(),
            DeliveryOutcome::Delivered
        );
        assert_eq!(
            service.deliver_once(&payload).await.unwrap(),
            DeliveryOutcome::AlreadyDelivered
        );
    }

    #[tokio::test]
    async fn a_failed_delivery_releases_the_claim_for_retry() {
        let mut adapter = MockDeliveryAdapter::new();
        let mut calls = 0;
        adapter.expect_deliver().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Box::pin(async { Err(anyhow::anyhow!("form endpoint unavailable")) })
            } else {
                Box::pin(async { Ok(()) })
            }
        });

        let service = DeliveryService::new(
            Arc::new(adapter),
            Arc::new(InMemoryDeliveryLedger::new()),
        );

        let payload = payload("pi_1");
        assert!(service.deliver_once(&payload).await.is_err());
        assert_eq!(
            service.deliver_once(&payload).await.unwrap(),
            DeliveryOutcome::Delivered
        );
    }
}
