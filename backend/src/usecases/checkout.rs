use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use crates::{
    delivery::google_form::DeliveryPayload,
    domain::{
        repositories::deliveries::DeliveryLedger,
        value_objects::{
            orders::{Order, looks_like_email},
            plans::PlanType,
        },
    },
    payments::stripe_client::{StripeClient, StripeEvent, StripePaymentIntent},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::usecases::delivery::{DeliveryAdapter, DeliveryService};

/// Server-side Stripe operations the checkout and webhook usecases need.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait StripeGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        description: &str,
        receipt_email: Option<String>,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripePaymentIntent>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> AnyResult<StripePaymentIntent>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        description: &str,
        receipt_email: Option<String>,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripePaymentIntent> {
        self.create_payment_intent(amount_minor, description, receipt_email.as_deref(), metadata)
            .await
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> AnyResult<StripePaymentIntent> {
        self.retrieve_payment_intent(intent_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

/// Letter form fields as the client submits them.
#[derive(Debug, Clone, Deserialize)]
pub struct LetterFormPayload {
    #[serde(rename = "paraQuien", default)]
    pub para_quien: String,
    #[serde(default)]
    pub ocasion: String,
    #[serde(default)]
    pub relacion: String,
    #[serde(default)]
    pub emociones: Vec<String>,
    #[serde(default)]
    pub detalles: String,
    #[serde(default)]
    pub tono: String,
    #[serde(rename = "tuNombre", default)]
    pub tu_nombre: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub amount: Option<f64>,
    #[serde(rename = "planType")]
    pub plan_type: Option<String>,
    #[serde(rename = "customerEmail", default)]
    pub customer_email: Option<String>,
    #[serde(rename = "formData", default)]
    pub form_data: Option<LetterFormPayload>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentIntentResponse {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "paymentIntentId")]
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(rename = "prefillUrl", skip_serializing_if = "Option::is_none")]
    pub prefill_url: Option<String>,
}

pub struct CheckoutUseCase<Stripe, D, L>
where
    Stripe: StripeGateway + Send + Sync + 'static,
    D: DeliveryAdapter + Send + Sync + 'static,
    L: DeliveryLedger + Send + Sync + 'static,
{
    stripe_client: Arc<Stripe>,
    delivery: Arc<DeliveryService<D, L>>,
}

impl<Stripe, D, L> CheckoutUseCase<Stripe, D, L>
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

    /// Validates the order and opens a payment intent for it. The charge
    /// amount always comes from the plan catalog, never from the client.
    pub async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> UseCaseResult<CreatePaymentIntentResponse> {
        let amount = request
            .amount
            .ok_or_else(|| CheckoutError::Validation("amount is required".to_string()))?;
        if amount <= 0.0 {
            return Err(CheckoutError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let plan_raw = request
            .plan_type
            .ok_or_else(|| CheckoutError::Validation("planType is required".to_string()))?;
        let plan_type = PlanType::from_str(&plan_raw).ok_or_else(|| {
            let err = CheckoutError::Validation(format!("unknown planType: {plan_raw}"));
            warn!(
                plan_type = %plan_raw,
                status = err.status_code().as_u16(),
                "checkout: rejected unknown plan type"
            );
            err
        })?;

        let form = request
            .form_data
            .ok_or_else(|| CheckoutError::Validation("formData is required".to_string()))?;

        // A syntactically broken email never becomes a receipt_email. A
        // form-field address is kept in metadata as the buyer typed it; a
        // bare top-level one survives only when it passes the shape check.
        let top_level_email = request.customer_email.filter(|e| !e.trim().is_empty());
        let form_email = form.email.clone().filter(|e| !e.trim().is_empty());
        let receipt_email = [top_level_email.as_deref(), form_email.as_deref()]
            .into_iter()
            .flatten()
            .find(|e| looks_like_email(e))
            .map(str::to_string);
        if receipt_email.is_none() {
            if let Some(email) = top_level_email.as_deref().or(form_email.as_deref()) {
                warn!(email = %email, "checkout: email failed the shape check, no receipt will be sent");
            }
        }
        let order_email = form_email.or_else(|| receipt_email.clone());

        let order = Order {
            plan_type,
            para_quien: form.para_quien,
            ocasion: form.ocasion,
            relacion: form.relacion,
            emociones: form.emociones,
            detalles: form.detalles,
            tono: form.tono,
            tu_nombre: form.tu_nombre,
            email: order_email,
            created_at: Utc::now(),
        };
        order
            .validate()
            .map_err(|err| CheckoutError::Validation(err.to_string()))?;

        let config = plan_type.config();
        let client_minor = (amount * 100.0).round() as i64;
        if client_minor != config.price_minor {
            warn!(
                plan_type = %plan_type,
                client_amount_minor = client_minor,
                catalog_amount_minor = config.price_minor,
                "checkout: client-submitted amount ignored in favor of catalog price"
            );
        }

        let description = format!("LoQueCallas – {}", config.name);

        info!(
            plan_type = %plan_type,
            amount_minor = config.price_minor,
            has_receipt_email = receipt_email.is_some(),
            "checkout: creating payment intent"
        );

        let intent = self
            .stripe_client
            .create_payment_intent(
                config.price_minor,
                &description,
                receipt_email,
                order.to_metadata(),
            )
            .await
            .map_err(|err| {
                error!(
                    plan_type = %plan_type,
                    error = ?err,
                    "checkout: stripe payment intent creation failed"
                );
                CheckoutError::Internal(err)
            })?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            error!(
                payment_intent_id = %intent.id,
                "checkout: stripe returned an intent without a client secret"
            );
            CheckoutError::Internal(anyhow!("payment intent missing client secret"))
        })?;

        info!(
            payment_intent_id = %intent.id,
            "checkout: payment intent created"
        );

        Ok(CreatePaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
        })
    }

    /// Authoritative success check: re-fetches the intent from Stripe and
    /// only trusts what the processor reports. A non-succeeded status is
    /// a normal outcome, not an error.
    pub async fn verify_payment(
        &self,
        payment_intent_id: &str,
    ) -> UseCaseResult<VerifyPaymentResponse> {
        if payment_intent_id.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "paymentIntentId is required".to_string(),
            ));
        }

        let intent = self
            .stripe_client
            .retrieve_payment_intent(payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id = %payment_intent_id,
                    error = ?err,
                    "checkout: failed to retrieve payment intent for verification"
                );
                CheckoutError::Internal(err)
            })?;

        info!(
            payment_intent_id = %intent.id,
            status = %intent.status,
            "checkout: verifying payment intent"
        );

        if !intent.is_succeeded() {
            return Ok(VerifyPaymentResponse {
                success: false,
                status: intent.status,
                order: None,
                prefill_url: None,
            });
        }

        let order = Order::from_metadata(&intent.metadata).map_err(|err| {
            error!(
                payment_intent_id = %intent.id,
                error = ?err,
                "checkout: intent metadata does not reconstruct an order"
            );
            CheckoutError::Internal(err)
        })?;

        let payload = DeliveryPayload::new(order.clone(), intent.id.clone(), intent.amount);

        // Convenience delivery; the webhook path is authoritative and
        // will retry if this attempt fails.
        if let Err(err) = self.delivery.deliver_once(&payload).await {
            warn!(
                payment_intent_id = %intent.id,
                error = ?err,
                "checkout: delivery from verification path failed, webhook will retry"
            );
        }

        Ok(VerifyPaymentResponse {
            success: true,
            status: intent.status,
            order: Some(order),
            prefill_url: self.delivery.prefill_url(&payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::delivery::MockDeliveryAdapter;
    use crates::delivery::memory_ledger::InMemoryDeliveryLedger;

    fn form() -> LetterFormPayload {
        LetterFormPayload {
            para_quien: "Mi madre".to_string(),
            ocasion: "Cumpleaños".to_string(),
            relacion: "Madre e hija".to_string(),
            emociones: vec!["Amor".to_string(), "Gratitud".to_string()],
            detalles: "Siempre me esperaba con la cena lista".to_string(),
            tono: "Emotivo".to_string(),
            tu_nombre: "Lucía".to_string(),
            email: Some("lucia@example.com".to_string()),
        }
    }

    fn request(amount: f64, plan_type: &str) -> CreatePaymentIntentRequest {
        CreatePaymentIntentRequest {
            amount: Some(amount),
            plan_type: Some(plan_type.to_string()),
            customer_email: Some("lucia@example.com".to_string()),
            form_data: Some(form()),
        }
    }

    fn created_intent() -> StripePaymentIntent {
        serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "client_secret": "pi_1_secret_abc",
            "status": "requires_payment_method",
            "amount": 99
        }))
        .unwrap()
    }

    fn succeeded_intent(metadata: HashMap<String, String>) -> StripePaymentIntent {
        serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "status": "succeeded",
            "amount": 99,
            "metadata": metadata
        }))
        .unwrap()
    }

    fn usecase(
        stripe: MockStripeGateway,
        adapter: MockDeliveryAdapter,
    ) -> CheckoutUseCase<MockStripeGateway, MockDeliveryAdapter, InMemoryDeliveryLedger> {
        CheckoutUseCase::new(
            Arc::new(stripe),
            Arc::new(DeliveryService::new(
                Arc::new(adapter),
                Arc::new(InMemoryDeliveryLedger::new()),
            )),
        )
    }

    #[tokio::test]
    async fn the_catalog_price_wins_over_the_client_amount() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .withf(|amount_minor, _, _, _| *amount_minor == 99)
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(created_intent()) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());
        // Client claims a 50 cent basic letter; the catalog says 99.
        let response = usecase
            .create_payment_intent(request(0.50, "basica"))
            .await
            .unwrap();

        assert_eq!(response.payment_intent_id, "pi_1");
        assert_eq!(response.client_secret, "pi_1_secret_abc");
    }

    #[tokio::test]
    async fn a_basic_letter_charges_99_minor_units() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .withf(|amount_minor, description, _, _| {
                *amount_minor == 99 && description.contains("Carta Básica")
            })
            .returning(|_, _, _, _| Box::pin(async { Ok(created_intent()) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());
        usecase
            .create_payment_intent(request(0.99, "basica"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn an_unknown_plan_is_rejected_before_any_stripe_call() {
        let usecase = usecase(MockStripeGateway::new(), MockDeliveryAdapter::new());
        let err = usecase
            .create_payment_intent(request(0.99, "deluxe"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_emociones_are_rejected_before_any_stripe_call() {
        let usecase = usecase(MockStripeGateway::new(), MockDeliveryAdapter::new());

        let mut request = request(0.99, "basica");
        request.form_data.as_mut().unwrap().emociones.clear();

        let err = usecase.create_payment_intent(request).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("emociones"));
    }

    #[tokio::test]
    async fn a_missing_amount_is_a_validation_error() {
        let usecase = usecase(MockStripeGateway::new(), MockDeliveryAdapter::new());

        let mut request = request(0.99, "basica");
        request.amount = None;

        let err = usecase.create_payment_intent(request).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn an_invalid_email_never_becomes_a_receipt_email() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .withf(|_, _, receipt_email, metadata| {
                receipt_email.is_none() && !metadata.contains_key("customer_email")
            })
            .returning(|_, _, _, _| Box::pin(async { Ok(created_intent()) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());

        let mut request = request(0.99, "basica");
        request.customer_email = Some("not-an-email".to_string());
        request.form_data.as_mut().unwrap().email = None;

        usecase.create_payment_intent(request).await.unwrap();
    }

    #[tokio::test]
    async fn a_form_field_email_is_kept_even_when_unusable_for_receipts() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .withf(|_, _, receipt_email, metadata| {
                receipt_email.is_none() && metadata["customer_email"] == "lucia arroba example"
            })
            .returning(|_, _, _, _| Box::pin(async { Ok(created_intent()) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());

        let mut request = request(0.99, "basica");
        request.customer_email = None;
        request.form_data.as_mut().unwrap().email = Some("lucia arroba example".to_string());

        usecase.create_payment_intent(request).await.unwrap();
    }

    #[tokio::test]
    async fn upstream_failure_surfaces_as_internal() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_payment_intent()
            .returning(|_, _, _, _| Box::pin(async { Err(anyhow!("stripe is down")) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());
        let err = usecase
            .create_payment_intent(request(0.99, "basica"))
            .await
            .unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn a_non_succeeded_intent_verifies_as_a_normal_failure() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_retrieve_payment_intent().returning(|_| {
            Box::pin(async {
                Ok(serde_json::from_value(serde_json::json!({
                    "id": "pi_1",
                    "status": "processing",
                    "amount": 99
                }))
                .unwrap())
            })
        });

        let usecase = usecase(stripe, MockDeliveryAdapter::new());
        let response = usecase.verify_payment("pi_1").await.unwrap();

        assert!(!response.success);
        assert_eq!(response.status, "processing");
        assert!(response.order.is_none());
    }

    #[tokio::test]
    async fn a_succeeded_intent_reconstructs_the_order_and_delivers_once() {
        let order_metadata = {
            let mut request = request(0.99, "basica");
            let form = request.form_data.take().unwrap();
            Order {
                plan_type: PlanType::Basica,
                para_quien: form.para_quien,
                ocasion: form.ocasion,
                relacion: form.relacion,
                emociones: form.emociones,
                detalles: form.detalles,
                tono: form.tono,
                tu_nombre: form.tu_nombre,
                email: form.email,
                created_at: Utc::now(),
            }
            .to_metadata()
        };

        let mut stripe = MockStripeGateway::new();
        let metadata = order_metadata.clone();
        stripe.expect_retrieve_payment_intent().returning(move |_| {
            let metadata = metadata.clone();
            Box::pin(async move { Ok(succeeded_intent(metadata)) })
        });

        let mut adapter = MockDeliveryAdapter::new();
        adapter
            .expect_deliver()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        adapter
            .expect_prefill_url()
            .returning(|_| Some("https://docs.google.com/forms/prefilled".to_string()));

        let usecase = usecase(stripe, adapter);

        let first = usecase.verify_payment("pi_1").await.unwrap();
        assert!(first.success);
        assert_eq!(
            first.order.as_ref().unwrap().emociones,
            vec!["Amor", "Gratitud"]
        );
        assert!(first.prefill_url.is_some());

        // Verifying again must not deliver a second time.
        let second = usecase.verify_payment("pi_1").await.unwrap();
        assert!(second.success);
    }

    #[tokio::test]
    async fn a_failed_stripe_lookup_is_an_upstream_error() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_payment_intent()
            .returning(|_| Box::pin(async { Err(anyhow!("timeout")) }));

        let usecase = usecase(stripe, MockDeliveryAdapter::new());
        let err = usecase.verify_payment("pi_1").await.unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
