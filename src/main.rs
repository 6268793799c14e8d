use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qrtrack::analytics::ScanRecorder;
use qrtrack::config::Config;
use qrtrack::storage::{self, CachedStorage, Storage};
use qrtrack::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!(
        backend = ?config.database.backend,
        "Initializing storage: {}", config.database.url
    );
    let backend = storage::connect(&config.database).await?;
    let storage: Arc<dyn Storage> = Arc::new(CachedStorage::new(backend, &config.cache));
    info!("Database initialized successfully");

    let recorder = ScanRecorder::new(Arc::clone(&storage));

    let api_router = api::create_api_router(Arc::clone(&storage), &config);
    let redirect_router = redirect::create_redirect_router(
        Arc::clone(&storage),
        recorder,
        config.proxy.clone(),
        config.redirect_status,
    );

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}/api", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!(
        "Redirect server listening on http://{} (short URLs: {})",
        redirect_addr, config.redirect_base_url
    );

    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        ),
    )?;

    Ok(())
}
