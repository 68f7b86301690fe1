pub mod confirm_flow;
pub mod stripe_client;
