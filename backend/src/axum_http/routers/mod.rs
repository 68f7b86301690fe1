pub mod payments;
pub mod stripe_webhook;
