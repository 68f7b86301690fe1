use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::plans::PlanType;

/// Separator used when flattening the emotions list into intent metadata.
pub const EMOCIONES_SEPARATOR: &str = ", ";

/// A validated letter order. Once checkout begins this data lives only in
/// the payment intent metadata, so `to_metadata`/`from_metadata` must stay
/// lossless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    #[serde(rename = "planElegido")]
    pub plan_type: PlanType,
    #[serde(rename = "paraQuien")]
    pub para_quien: String,
    pub ocasion: String,
    pub relacion: String,
    pub emociones: Vec<String>,
    pub detalles: String,
    pub tono: String,
    #[serde(rename = "tuNombre")]
    pub tu_nombre: String,
    pub email: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Rejects incomplete orders before any payment call is made.
    pub fn validate(&self) -> Result<()> {
        let text_fields = [
            ("paraQuien", &self.para_quien),
            ("ocasion", &self.ocasion),
            ("relacion", &self.relacion),
            ("detalles", &self.detalles),
            ("tono", &self.tono),
            ("tuNombre", &self.tu_nombre),
        ];

        for (name, value) in text_fields {
            if value.trim().is_empty() {
                bail!("{} is required", name);
            }
        }

        if self.emociones.iter().all(|e| e.trim().is_empty()) {
            bail!("emociones is required");
        }

        Ok(())
    }

    /// Flattens the order into the intent metadata map. This is the sole
    /// persistence mechanism for order data.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::from([
            ("plan_type".to_string(), self.plan_type.to_string()),
            ("para_quien".to_string(), self.para_quien.clone()),
            ("ocasion".to_string(), self.ocasion.clone()),
            ("relacion".to_string(), self.relacion.clone()),
            (
                "emociones".to_string(),
                self.emociones.join(EMOCIONES_SEPARATOR),
            ),
            ("detalles".to_string(), self.detalles.clone()),
            ("tono".to_string(), self.tono.clone()),
            ("tu_nombre".to_string(), self.tu_nombre.clone()),
            ("timestamp".to_string(), self.created_at.to_rfc3339()),
        ]);

        if let Some(email) = self.email.as_deref() {
            metadata.insert("customer_email".to_string(), email.to_string());
        }

        metadata
    }

    /// Reconstructs the order from intent metadata. The payment-intent
    /// path writes snake_case keys; the redirect-checkout session variant
    /// writes the camelCase form names, so both conventions are read.
    /// Text fields missing from older intents come back empty; the plan
    /// type must be present because pricing and delivery both key off it.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self> {
        let field = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| metadata.get(*key)).cloned()
        };

        let plan_raw = field(&["plan_type", "planElegido"])
            .context("plan_type missing from intent metadata")?;
        let plan_type = PlanType::from_str(&plan_raw)
            .with_context(|| format!("unknown plan_type in intent metadata: {plan_raw}"))?;

        let emociones = field(&["emociones"])
            .map(|joined| {
                joined
                    .split(EMOCIONES_SEPARATOR)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let created_at = field(&["timestamp"])
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            plan_type,
            para_quien: field(&["para_quien", "paraQuien"]).unwrap_or_default(),
            ocasion: field(&["ocasion"]).unwrap_or_default(),
            relacion: field(&["relacion"]).unwrap_or_default(),
            emociones,
            detalles: field(&["detalles"]).unwrap_or_default(),
            tono: field(&["tono"]).unwrap_or_default(),
            tu_nombre: field(&["tu_nombre", "tuNombre"]).unwrap_or_default(),
            email: field(&["customer_email", "email"]),
            created_at,
        })
    }
}

/// Shape check matching the original `\S+@\S+\.\S+` gate: an address that
/// fails this still goes into metadata, it just never becomes a
/// `receipt_email`.
pub fn looks_like_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !local.chars().any(char::is_whitespace)
                && !domain.chars().any(char::is_whitespace)
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        _ => false,
    }
}
