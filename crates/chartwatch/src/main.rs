mod api;
mod cache;
mod config;
mod fetch;
mod state;

use std::fs;

use api::api_router;
use cache::{LibraryCache, LoadOutcome};
use config::{config_path_from_env, load_or_create_config};
use fetch::ChartFetcher;
use library::ArchiveStore;
use reqwest::Client;
use state::AppState;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let documents = config.documents_dir(&config_path);
    fs::create_dir_all(&documents)?;
    let archive_path = config.archive_file(&config_path);

    let client = Client::builder().user_agent("chartwatch/0.1").build()?;
    let fetcher = ChartFetcher::new(client, config.chart_url.clone(), documents.clone());
    let cache = LibraryCache::new(
        documents,
        ArchiveStore::new(archive_path),
        fetcher,
        config.cleanup_on_refresh,
    );
    info!("Caching media in {:?}", cache.documents());
    cache.subscribe(|event| info!("Library changed: {:?}", event));

    match cache.load().await {
        LoadOutcome::Restored { songs } => info!("{} songs cached", songs),
        LoadOutcome::Fetching(handle) => {
            info!("No archive yet; fetching {}", config.chart_url);
            tokio::spawn(async move {
                match handle.await {
                    Ok(Ok(songs)) => info!("{} songs cached", songs),
                    Ok(Err(_)) => warn!("No songs cached; refresh to retry"),
                    Err(err) => warn!("Initial fetch task failed: {}", err),
                }
            });
        }
    }

    let app = api_router(AppState { cache }).layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
