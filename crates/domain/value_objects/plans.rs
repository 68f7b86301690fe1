use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Letter plan tiers sold on the site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Basica,
    Premium,
}

/// Server-held authoritative pricing for a plan. The client never decides
/// the charge amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanConfig {
    /// Charge amount in EUR minor units (cents).
    pub price_minor: i64,
    pub name: &'static str,
    pub description: &'static str,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Basica => "basica",
            PlanType::Premium => "premium",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "basica" => Some(PlanType::Basica),
            "premium" => Some(PlanType::Premium),
            _ => None,
        }
    }

    pub fn config(&self) -> PlanConfig {
        match self {
            PlanType::Basica => PlanConfig {
                price_minor: 99,
                name: "Carta Básica",
                description: "Carta personalizada de 140-160 palabras",
            },
            PlanType::Premium => PlanConfig {
                price_minor: 399,
                name: "Carta Premium",
                description: "Carta profunda y detallada de 250-300 palabras",
            },
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
