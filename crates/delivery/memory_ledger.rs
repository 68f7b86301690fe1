use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::repositories::deliveries::DeliveryLedger;

/// Single-process delivery ledger. The mutex makes check-and-mark atomic
/// across a racing webhook delivery and client confirmation; a shared
/// deployment would put a uniqueness constraint behind the same trait.
#[derive(Default)]
pub struct InMemoryDeliveryLedger {
    seen: Mutex<HashSet<String>>,
}

impl InMemoryDeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryDeliveryLedger {
    async fn mark_delivered(&self, payment_intent_id: &str) -> Result<bool> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("delivery ledger lock poisoned"))?;
        Ok(seen.insert(payment_intent_id.to_string()))
    }

    async fn release(&self, payment_intent_id: &str) -> Result<()> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("delivery ledger lock poisoned"))?;
        seen.remove(payment_intent_id);
        Ok(())
    }
}
