//! aws-relay - transparent SQS relay
//!
//! Sits between an SQS client and an SQS-compatible endpoint (LocalStack,
//! ElasticMQ, ...), forwards every request unchanged and records message
//! lifecycles for the dashboard.

mod config;
mod dashboard;
mod router;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use awsrelay_core::RelayError;
use awsrelay_sqs::{LifecycleStore, ProxyState};

#[derive(Parser, Debug)]
#[command(name = "awsrelay")]
#[command(about = "Transparent SQS relay with a message lifecycle dashboard", long_about = None)]
struct Args {
    /// Upstream SQS endpoint
    #[arg(long, env = "AWS_UPSTREAM_URL")]
    upstream: Option<String>,

    /// Address the relay listens on
    #[arg(long, env = "AWS_RELAY_ADDR")]
    listen: Option<String>,

    /// Address the dashboard listens on
    #[arg(long, env = "AWS_DASHBOARD_ADDR")]
    dashboard: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, env = "AWS_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AWS_RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, RelayError> {
    TcpListener::bind(addr).await.map_err(|source| RelayError::Bind {
        addr: addr.to_string(),
        source,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::Config::load(args.config.as_deref())?;
    config.override_with(args.upstream, args.listen, args.dashboard, args.log_level);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "awsrelay={level},awsrelay_sqs={level},tower_http=debug",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = config.resolve()?;

    // One store shared by the relay and the dashboard
    let store = Arc::new(LifecycleStore::new());
    let proxy_state = Arc::new(ProxyState::new(settings.upstream.clone(), store.clone())?);

    let proxy_app = router::create_proxy_router(proxy_state);
    let dashboard_app = router::create_dashboard_router(store);

    let dashboard_listener = bind(settings.dashboard).await?;
    let proxy_listener = bind(settings.listen).await?;

    info!("Dashboard listening on http://{}", settings.dashboard);
    info!(
        "AWS Relay listening on {} -> {}",
        settings.listen, settings.upstream
    );

    tokio::try_join!(
        async { axum::serve(dashboard_listener, dashboard_app).await },
        async { axum::serve(proxy_listener, proxy_app).await },
    )?;

    Ok(())
}
