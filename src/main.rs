//! Backoffice order bridge server.
//!
//! Bridges CSV order exports into the fulfilment API and streams order
//! listings back out as CSV downloads.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use order_bridge::FulfilmentApi;

/// Backoffice order bridge - CSV order import and order export against the fulfilment API
#[derive(Parser, Debug)]
#[command(name = "order_bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the upstream fulfilment API
    #[arg(long, env = "FULFILMENT_API_URL")]
    api_url: String,

    /// Bearer token for the upstream fulfilment API
    #[arg(long, env = "FULFILMENT_API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// Fulfilment client id stamped on every submitted line item
    #[arg(long, env = "FULFILMENT_CLIENT_ID", default_value_t = 105)]
    fulfilment_client_id: u32,

    /// Timeout in seconds for upstream API requests
    #[arg(long, default_value_t = 30)]
    upstream_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!("Starting order_bridge...");
    log::info!("Fulfilment API: {}", args.api_url);

    let api = match FulfilmentApi::new(
        args.api_url,
        args.api_token,
        Duration::from_secs(args.upstream_timeout_secs),
    ) {
        Ok(api) => api,
        Err(e) => {
            log::error!("Failed to create fulfilment API client: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = order_bridge::web::serve(Arc::new(api), args.fulfilment_client_id, args.port).await
    {
        log::error!("Web server error: {e}");
        std::process::exit(1);
    }
}
