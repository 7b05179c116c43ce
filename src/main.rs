use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flux_relay::{AppConfig, ImageRelay, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    if config.api_token.is_empty() {
        tracing::warn!("HF_TOKEN is not set; upstream calls will be unauthenticated");
    }

    let relay = Arc::new(ImageRelay::initialize(config.as_ref())?);
    tracing::info!(
        token_set = !config.api_token.is_empty(),
        output_mode = ?relay.output_mode(),
        output_dir = %config.output_dir.display(),
        "image relay initialized"
    );
    let router = build_router(config.clone(), relay);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
