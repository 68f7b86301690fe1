pub mod payment_intent_statuses;
