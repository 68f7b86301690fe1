pub mod checkout;
pub mod delivery;
pub mod stripe_webhook;
