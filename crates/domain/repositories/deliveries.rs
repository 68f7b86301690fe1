use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Tracks which payment intents have already been forwarded downstream.
/// Webhook delivery is at-least-once and the client confirmation path can
/// race it, so `mark_delivered` must be an atomic check-and-mark.
#[async_trait]
#[automock]
pub trait DeliveryLedger: Send + Sync {
    /// Returns `true` if this call claimed the intent id, `false` when it
    /// was already claimed by an earlier delivery.
    async fn mark_delivered(&self, payment_intent_id: &str) -> Result<bool>;

    /// Gives a claim back after a failed delivery so the processor-driven
    /// retry is not suppressed.
    async fn release(&self, payment_intent_id: &str) -> Result<()>;
}
