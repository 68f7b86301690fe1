use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle states of a Stripe payment intent. Progression is monotonic
/// toward `succeeded` or `canceled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "requires_payment_method" => Some(PaymentIntentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Some(PaymentIntentStatus::RequiresConfirmation),
            "requires_action" => Some(PaymentIntentStatus::RequiresAction),
            "processing" => Some(PaymentIntentStatus::Processing),
            "succeeded" => Some(PaymentIntentStatus::Succeeded),
            "canceled" => Some(PaymentIntentStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Succeeded | PaymentIntentStatus::Canceled
        )
    }
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
