use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tracing::info;
use url::Url;

use crate::domain::value_objects::orders::{EMOCIONES_SEPARATOR, Order};

/// Production letter-intake form. Overridable via configuration.
pub const DEFAULT_FORM_URL: &str = "https://docs.google.com/forms/d/e/1FAIpQLSco0xfmy5yVp0GXaSP7w3Jn2B3Le5TNih7mpDVGCbBXILiA2Q/viewform";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the downstream form needs about one confirmed order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPayload {
    pub order: Order,
    pub payment_intent_id: String,
    /// Human-readable EUR amount, e.g. "0.99".
    pub amount: String,
    /// RFC3339 delivery timestamp.
    pub timestamp: String,
}

impl DeliveryPayload {
    pub fn new(order: Order, payment_intent_id: String, amount_minor: i64) -> Self {
        Self {
            order,
            payment_intent_id,
            amount: format!("{:.2}", amount_minor as f64 / 100.0),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Forwards confirmed orders to the Google Form that feeds letter
/// generation. The form's entry ids are its data contract.
pub struct GoogleFormClient {
    http: reqwest::Client,
    view_url: Url,
}

impl GoogleFormClient {
    pub fn new(form_url: &str) -> Result<Self> {
        let view_url = Url::parse(form_url).context("invalid google form url")?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, view_url })
    }

    /// Submits the payload to the form's `/formResponse` endpoint,
    /// form-encoded like a browser submission.
    pub async fn submit(&self, payload: &DeliveryPayload) -> Result<()> {
        let response_url = self
            .view_url
            .as_str()
            .replace("/viewform", "/formResponse");

        info!(
            payment_intent_id = %payload.payment_intent_id,
            "google_form: submitting confirmed order"
        );

        self.http
            .post(&response_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&Self::entries(payload))
            .send()
            .await?
            .error_for_status()
            .context("google form submission rejected")?;

        info!(
            payment_intent_id = %payload.payment_intent_id,
            "google_form: order delivered"
        );
        Ok(())
    }

    /// Builds the `/viewform` URL with all entries prefilled. This is the
    /// non-authoritative convenience path shown to the buyer after the
    /// client-side confirmation; the webhook submission is authoritative.
    pub fn prefill_url(&self, payload: &DeliveryPayload) -> Url {
        let mut url = self.view_url.clone();
        for (entry, value) in Self::entries(payload) {
            url.query_pairs_mut().append_pair(entry, &value);
        }
        url
    }

    fn entries(payload: &DeliveryPayload) -> Vec<(&'static str, String)> {
        let order = &payload.order;
        let mut entries = vec![
            ("entry.1876306950", order.para_quien.clone()),
            ("entry.1925524653", order.ocasion.clone()),
            ("entry.1780892610", order.relacion.clone()),
            (
                "entry.1034540138",
                order.emociones.join(EMOCIONES_SEPARATOR),
            ),
            ("entry.1155486927", order.detalles.clone()),
            ("entry.1244248194", order.tono.clone()),
            ("entry.1484056496", order.tu_nombre.clone()),
        ];

        if let Some(email) = order.email.as_deref() {
            entries.push(("entry.275195844", email.to_string()));
        }

        entries
    }
}
