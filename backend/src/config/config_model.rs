#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub stripe: Stripe,
    pub delivery: Delivery,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

/// Stripe keys are opaque configuration; the publishable key is only ever
/// handed to the browser, the other two never leave the server.
#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub form_url: String,
}
