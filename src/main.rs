//! Caching render proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ dispatch::classify
//!                                   │
//!            ┌──────────┬───────────┼───────────┬──────────┐
//!            ▼          ▼           ▼           ▼          ▼
//!         render     proxy        tunnel     metrics    static
//!            │          │           │
//!            ▼          ▼           ▼
//!      cache tier (LRU + redis)   backend
//!            │          │
//!            ▼          ▼
//!       renderer    fetch + charset
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use render_proxy::config::{load_config, ProxyConfig};
use render_proxy::lifecycle::{shutdown_on_signal, Shutdown};
use render_proxy::net::load_tls_config;
use render_proxy::observability::logging::init_logging;
use render_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "render-proxy", version, about = "Caching render proxy")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.observability);

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = config.listener.workers {
        runtime.worker_threads(workers);
    }

    runtime.build()?.block_on(run(config))
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn Error>> {
    tracing::info!("render-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = ?config.listener.workers,
        tls = config.listener.tls.is_some(),
        redis = config.cache.redis_url.is_some(),
        "Configuration loaded"
    );

    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::from_config(config).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, tls, receiver).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, receiver).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
