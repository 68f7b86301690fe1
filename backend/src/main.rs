use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::delivery::google_form::GoogleFormClient;
use crates::payments::stripe_client::StripeClient;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let stripe_client = StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
    )?;
    let form_client = GoogleFormClient::new(&dotenvy_env.delivery.form_url)?;
    info!("Stripe and Google Form clients are ready");

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(stripe_client),
        Arc::new(form_client),
    )
    .await?;

    Ok(())
}
