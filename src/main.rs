use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_bridge::{
    cache::{LinkCache, ManifestCache},
    config::Config,
    fetch::{ManifestFetcher, UpstreamFetcher},
    jobs,
    metadata::TmdbProvider,
    pool::{Credentials, SessionPool},
    resolver::UpstreamApi,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "hls-bridge")]
#[command(about = "HLS manifest rewriting and caching reverse proxy")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("hls_bridge={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HLS Bridge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let fetcher: Arc<dyn ManifestFetcher> = Arc::new(UpstreamFetcher::new(
        config.upstream.connect_timeout,
        config.upstream.request_timeout,
        &config.upstream.user_agent,
    )?);

    let api_client = reqwest::Client::builder()
        .connect_timeout(config.upstream.connect_timeout)
        .timeout(config.upstream.request_timeout)
        .user_agent(config.upstream.user_agent.clone())
        .build()?;

    let api = Arc::new(UpstreamApi::new(
        api_client.clone(),
        config.upstream.api_base.clone(),
        config.upstream.app_key.clone(),
        config.upstream.auth_token.clone(),
    ));

    let credentials: Vec<Credentials> = config
        .upstream
        .profiles
        .iter()
        .filter_map(|raw| {
            let parsed = Credentials::parse(raw);
            if parsed.is_none() {
                warn!("ignoring malformed credential entry (expected user:pass)");
            }
            parsed
        })
        .collect();

    let pool = Arc::new(SessionPool::new());
    pool.refresh(api.as_ref(), &credentials).await;
    info!(profiles = pool.len().await, "initial credential pool built");

    let manifests = Arc::new(ManifestCache::new(
        Arc::clone(&fetcher),
        config.proxy_base(),
        config.cache.manifest_ttl,
        config.cache.manifest_capacity,
    ));
    let links = Arc::new(LinkCache::new());

    let metadata = Arc::new(TmdbProvider::new(
        api_client,
        config.metadata.tmdb_api_key.clone(),
        config.metadata.language.clone(),
    ));

    let shutdown = CancellationToken::new();

    let refresh_task = jobs::spawn_pool_refresh(
        config.jobs.pool_refresh_cron.clone(),
        Arc::clone(&pool),
        Arc::clone(&api),
        credentials,
        shutdown.clone(),
    );
    let sweep_task = jobs::spawn_link_sweep(
        config.jobs.link_sweep_cron.clone(),
        Arc::clone(&links),
        Arc::clone(&manifests),
        Arc::clone(&fetcher),
        shutdown.clone(),
    );

    let state = AppState {
        manifests,
        links,
        pool,
        api,
        metadata,
        proxy_base: config.proxy_base(),
        start_time: chrono::Utc::now(),
    };

    let server = WebServer::new(state, &config.web.host, config.web.port)?;

    // Translate process signals into the shared cancellation token.
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    server.serve_with_cancellation(shutdown.clone()).await?;

    shutdown.cancel();
    let _ = refresh_task.await;
    let _ = sweep_task.await;
    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down gracefully");
    }
}
