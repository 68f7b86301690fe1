use anyhow::{Ok, Result};
use crates::delivery::google_form::DEFAULT_FORM_URL;

use super::config_model::{Delivery, DotEnvyConfig, Server, Stripe};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let stripe = Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
        public_key: std::env::var("STRIPE_PUBLIC_KEY").expect("STRIPE_PUBLIC_KEY is invalid"),
    };

    let delivery = Delivery {
        form_url: std::env::var("GOOGLE_FORM_URL").unwrap_or_else(|_| DEFAULT_FORM_URL.to_string()),
    };

    Ok(DotEnvyConfig {
        server,
        stripe,
        delivery,
    })
}
