//! alertgate - Alertmanager webhook gateway
//!
//! Receives Alertmanager webhooks, throttles repeated notifications and
//! auto-resolves stale incidents.

use std::sync::Arc;

use alertgate_server::{AlertmanagerStore, Args, GatewayServer, WebhookNotifier};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("alertgate=info".parse()?)
        .add_directive("alertgate_server=info".parse()?)
        .add_directive("alertgate_core=info".parse()?);
    let json = args.log_json.then(|| fmt::layer().json());
    let plain = (!args.log_json).then(fmt::layer);
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();

    let config = args.into_config();

    let resolver = match config.load_rules() {
        Ok(resolver) => resolver,
        Err(e) => {
            error!(error = %e, "invalid rules configuration");
            return Err(e.into());
        }
    };

    let store = AlertmanagerStore::new(&config.alertmanager_url, config.request_timeout)?;
    let notifier = WebhookNotifier::new(config.request_timeout)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        state_source = ?config.state_source,
        utc_offset = %config.utc_offset,
        webhook = %config.webhook_url,
        "starting alertgate"
    );

    let addr = config.bind_addr;
    let server = GatewayServer::new(config, resolver, Arc::new(store), Arc::new(notifier));
    server
        .serve_with_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
