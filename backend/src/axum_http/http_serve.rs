use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        checkout::CheckoutUseCase, delivery::DeliveryService, stripe_webhook::StripeWebhookUseCase,
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
use crates::{
    delivery::{google_form::GoogleFormClient, memory_ledger::InMemoryDeliveryLedger},
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub async fn start(
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
    form_client: Arc<GoogleFormClient>,
) -> Result<()> {
    // One ledger instance backs both the webhook and the verification
    // path, so a racing pair converges on a single delivery.
    let delivery = Arc::new(DeliveryService::new(
        form_client,
        Arc::new(InMemoryDeliveryLedger::new()),
    ));

    let checkout_usecase = Arc::new(CheckoutUseCase::new(
        Arc::clone(&stripe_client),
        Arc::clone(&delivery),
    ));
    let webhook_usecase = Arc::new(StripeWebhookUseCase::new(stripe_client, delivery));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/payments",
            routers::payments::routes(checkout_usecase, config.stripe.public_key.clone()),
        )
        .nest(
            "/api/v1/stripe-webhook",
            routers::stripe_webhook::routes(webhook_usecase),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE])
                .allow_origin(Any), // TODO Pin to the storefront domain later
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdow_signal())
        .await?;

    Ok(())
}

async fn shutdow_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
