use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

use crate::domain::value_objects::enums::payment_intent_statuses::PaymentIntentStatus;

type HmacSha256 = Hmac<Sha256>;

/// Requests to the Stripe API must not hang the calling handler.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal Stripe client built on reqwest, scoped to the payment intent
/// lifecycle and webhook verification.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Payment intent fields this integration reads back. `status` stays raw
/// so unknown wire values survive; `status_parsed` gives the typed view.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    pub fn status_parsed(&self) -> Option<PaymentIntentStatus> {
        PaymentIntentStatus::from_str(&self.status)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status_parsed() == Some(PaymentIntentStatus::Succeeded)
    }
}

/// Checkout session payload carried by `checkout.session.completed`
/// events. Only the redirect-checkout integration variant produces these.
#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            secret_key,
            webhook_secret,
        })
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        // Operators get the full Stripe error envelope; callers only see
        // the generic message below.
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Creates a card-only EUR payment intent carrying the order metadata.
    /// https://stripe.com/docs/api/payment_intents/create
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        description: &str,
        receipt_email: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> Result<StripePaymentIntent> {
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), "eur".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("description".to_string(), description.to_string()),
        ];

        if let Some(email) = receipt_email {
            body.push(("receipt_email".to_string(), email.to_string()));
        }

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post("https://api.stripe.com/v1/payment_intents")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    /// Re-fetches intent state from Stripe. This is the authoritative
    /// check; client-reported success is never trusted.
    /// https://stripe.com/docs/api/payment_intents/retrieve
    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripePaymentIntent> {
        let resp = self
            .http
            .get(format!(
                "https://api.stripe.com/v1/payment_intents/{}",
                intent_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve payment intent").await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    /// Confirms an intent with an attached card payment method.
    /// https://stripe.com/docs/api/payment_intents/confirm
    pub async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
        receipt_email: Option<&str>,
    ) -> Result<StripePaymentIntent> {
        let mut body: Vec<(String, String)> =
            vec![("payment_method".to_string(), payment_method.to_string())];

        if let Some(email) = receipt_email {
            body.push(("receipt_email".to_string(), email.to_string()));
        }

        let resp = self
            .http
            .post(format!(
                "https://api.stripe.com/v1/payment_intents/{}/confirm",
                intent_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "confirm payment intent").await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    /// Verifies the webhook signature before the payload is parsed.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in stripe-signature"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}
