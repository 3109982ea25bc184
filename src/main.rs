use clap::{CommandFactory, Parser};
use discovery::config::{Cli, Config, EXIT_USAGE};
use discovery::proxy::leader::LeaderCache;
use discovery::proxy::service::Proxy;
use discovery::registry::service::Registry;
use discovery::server::{build_router, serve};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}\n", e);
            if let Err(e) = Cli::command().print_help() {
                eprintln!("failed to print usage: {}", e);
            }
            std::process::exit(EXIT_USAGE);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(metrics_addr) = config.metrics_addr {
        discovery::metrics::install_exporter(metrics_addr)?;
    }

    // 1. Proxy with its leader cache, seeded from --etcd:
    let leader = Arc::new(LeaderCache::new(config.initial_leader.clone()));
    let proxy = Arc::new(Proxy::with_leader(
        config.etcd.scheme(),
        leader,
        config.proxy.clone(),
    )?);

    // 2. Token registry on top of the proxy:
    let registry = Arc::new(Registry::new(proxy, config.public_host.clone()));

    // 3. HTTP router:
    let app = build_router(registry);

    tracing::info!(
        "discovery server started (etcd={}, host={}, attempts={}, timeout={:?})",
        config.etcd,
        config.public_host,
        config.proxy.max_attempts,
        config.proxy.timeout
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    serve(listener, app).await
}
