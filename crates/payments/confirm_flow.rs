use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::value_objects::enums::payment_intent_statuses::PaymentIntentStatus;
use crate::payments::stripe_client::{StripeClient, StripePaymentIntent};

/// The two processor calls the confirmation surface needs: re-derive
/// intent state and confirm with a mounted payment method.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationGateway: Send + Sync {
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripePaymentIntent>;

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
        receipt_email: Option<String>,
    ) -> Result<StripePaymentIntent>;
}

#[async_trait]
impl ConfirmationGateway for StripeClient {
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripePaymentIntent> {
        self.retrieve_payment_intent(intent_id).await
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
        receipt_email: Option<String>,
    ) -> Result<StripePaymentIntent> {
        self.confirm_payment_intent(intent_id, payment_method, receipt_email.as_deref())
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmFlowState {
    Idle,
    Initializing,
    Ready,
    /// Confirmation in flight, or interrupted by an off-page redirect.
    /// `resume` re-derives the real state from the processor.
    Submitting,
    Succeeded,
    Failed {
        message: String,
    },
}

/// Drives one checkout attempt against a single payment intent. The flow
/// mounts exactly once per attempt; a `Failed` state is the retry
/// affordance, never a dead end. Success reported here is still subject
/// to server-side verification.
pub struct ConfirmFlow<G>
where
    G: ConfirmationGateway,
{
    gateway: Arc<G>,
    intent_id: String,
    receipt_email: Option<String>,
    state: ConfirmFlowState,
}

impl<G> ConfirmFlow<G>
where
    G: ConfirmationGateway,
{
    pub fn new(gateway: Arc<G>, intent_id: String, receipt_email: Option<String>) -> Self {
        Self {
            gateway,
            intent_id,
            receipt_email,
            state: ConfirmFlowState::Idle,
        }
    }

    pub fn state(&self) -> &ConfirmFlowState {
        &self.state
    }

    /// Mounts the payment surface for this intent. Valid from `Idle`, or
    /// from `Failed` as the retry path.
    pub async fn initialize(&mut self) -> Result<&ConfirmFlowState> {
        match self.state {
            ConfirmFlowState::Idle | ConfirmFlowState::Failed { .. } => {}
            _ => bail!("payment surface already mounted for this attempt"),
        }

        self.state = ConfirmFlowState::Initializing;
        info!(intent_id = %self.intent_id, "confirm_flow: initializing payment surface");

        match self.gateway.retrieve_payment_intent(&self.intent_id).await {
            Ok(intent) => {
                self.state = match intent.status_parsed() {
                    Some(PaymentIntentStatus::Succeeded) => ConfirmFlowState::Succeeded,
                    Some(PaymentIntentStatus::Canceled) => ConfirmFlowState::Failed {
                        message: "El pago fue cancelado".to_string(),
                    },
                    _ => ConfirmFlowState::Ready,
                };
            }
            Err(err) => {
                error!(
                    intent_id = %self.intent_id,
                    error = ?err,
                    "confirm_flow: failed to initialize payment surface"
                );
                self.state = ConfirmFlowState::Failed {
                    message: "No se pudo cargar el formulario de pago. Inténtalo de nuevo."
                        .to_string(),
                };
            }
        }

        Ok(&self.state)
    }

    /// Confirms the charge with the mounted payment method. Redirect-based
    /// authentication leaves the flow in `Submitting`; `resume` picks it
    /// back up afterwards.
    pub async fn submit(&mut self, payment_method: &str) -> Result<&ConfirmFlowState> {
        if self.state != ConfirmFlowState::Ready {
            bail!("submit is only valid from the ready state");
        }

        self.state = ConfirmFlowState::Submitting;
        info!(intent_id = %self.intent_id, "confirm_flow: submitting payment");

        match self
            .gateway
            .confirm_payment_intent(&self.intent_id, payment_method, self.receipt_email.clone())
            .await
        {
            Ok(intent) => self.apply_intent(&intent),
            Err(err) => {
                error!(
                    intent_id = %self.intent_id,
                    error = ?err,
                    "confirm_flow: payment confirmation failed"
                );
                self.state = ConfirmFlowState::Failed {
                    message: "No se pudo procesar el pago. Inténtalo de nuevo.".to_string(),
                };
            }
        }

        Ok(&self.state)
    }

    /// Re-derives state from the processor after an off-page redirect.
    /// In-memory state is not trusted once the user has left the page.
    pub async fn resume(&mut self) -> Result<&ConfirmFlowState> {
        if self.state != ConfirmFlowState::Submitting {
            bail!("resume is only valid while a submission is in flight");
        }

        let intent = self.gateway.retrieve_payment_intent(&self.intent_id).await?;
        self.apply_intent(&intent);
        Ok(&self.state)
    }

    fn apply_intent(&mut self, intent: &StripePaymentIntent) {
        self.state = match intent.status_parsed() {
            Some(PaymentIntentStatus::Succeeded) => ConfirmFlowState::Succeeded,
            // The only other terminal status is a cancellation.
            Some(status) if status.is_terminal() => ConfirmFlowState::Failed {
                message: "El pago fue cancelado".to_string(),
            },
            Some(PaymentIntentStatus::RequiresPaymentMethod) => {
                warn!(
                    intent_id = %self.intent_id,
                    status = %intent.status,
                    "confirm_flow: payment method rejected"
                );
                ConfirmFlowState::Failed {
                    message: "Tu tarjeta fue rechazada. Prueba con otra tarjeta.".to_string(),
                }
            }
            // processing / requires_action / requires_confirmation, or a
            // status this integration does not know: still in flight.
            _ => ConfirmFlowState::Submitting,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(status: &str) -> StripePaymentIntent {
        serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "status": status,
            "amount": 99
        }))
        .unwrap()
    }

    fn flow(gateway: MockConfirmationGateway) -> ConfirmFlow<MockConfirmationGateway> {
        ConfirmFlow::new(
            Arc::new(gateway),
            "pi_1".to_string(),
            Some("ana@example.com".to_string()),
        )
    }

    #[tokio::test]
    async fn initialize_reaches_ready() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        assert_eq!(flow.state(), &ConfirmFlowState::Ready);
    }

    #[tokio::test]
    async fn initialize_failure_is_visible_and_retryable() {
        let mut gateway = MockConfirmationGateway::new();
        let mut calls = 0;
        gateway.expect_retrieve_payment_intent().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Box::pin(async { Err(anyhow::anyhow!("network down")) })
            } else {
                Box::pin(async { Ok(intent("requires_payment_method")) })
            }
        });

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        assert!(matches!(flow.state(), ConfirmFlowState::Failed { .. }));

        flow.initialize().await.unwrap();
        assert_eq!(flow.state(), &ConfirmFlowState::Ready);
    }

    #[tokio::test]
    async fn the_surface_mounts_exactly_once_per_attempt() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .times(1)
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        assert!(flow.initialize().await.is_err());
    }

    #[tokio::test]
    async fn submit_succeeds_on_an_immediate_charge() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));
        gateway
            .expect_confirm_payment_intent()
            .returning(|_, _, _| Box::pin(async { Ok(intent("succeeded")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        flow.submit("pm_card").await.unwrap();
        assert_eq!(flow.state(), &ConfirmFlowState::Succeeded);
    }

    #[tokio::test]
    async fn a_declined_card_is_a_specific_failure() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));
        gateway
            .expect_confirm_payment_intent()
            .returning(|_, _, _| Box::pin(async { Ok(intent("requires_payment_method")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        flow.submit("pm_card").await.unwrap();

        match flow.state() {
            ConfirmFlowState::Failed { message } => assert!(message.contains("tarjeta")),
            other => panic!("expected failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_authentication_resumes_to_succeeded() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .times(1)
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));
        gateway
            .expect_confirm_payment_intent()
            .returning(|_, _, _| Box::pin(async { Ok(intent("requires_action")) }));
        // After the redirect the processor is the source of truth again.
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Ok(intent("succeeded")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        flow.submit("pm_card").await.unwrap();
        assert_eq!(flow.state(), &ConfirmFlowState::Submitting);

        flow.resume().await.unwrap();
        assert_eq!(flow.state(), &ConfirmFlowState::Succeeded);
    }

    #[tokio::test]
    async fn resume_can_land_on_a_cancellation() {
        let mut gateway = MockConfirmationGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .times(1)
            .returning(|_| Box::pin(async { Ok(intent("requires_payment_method")) }));
        gateway
            .expect_confirm_payment_intent()
            .returning(|_, _, _| Box::pin(async { Ok(intent("processing")) }));
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Ok(intent("canceled")) }));

        let mut flow = flow(gateway);
        flow.initialize().await.unwrap();
        flow.submit("pm_card").await.unwrap();
        flow.resume().await.unwrap();
        assert!(matches!(flow.state(), ConfirmFlowState::Failed { .. }));
    }

    #[tokio::test]
    async fn submit_is_rejected_before_the_surface_is_ready() {
        let gateway = MockConfirmationGateway::new();
        let mut flow = flow(gateway);
        assert!(flow.submit("pm_card").await.is_err());
    }
}
