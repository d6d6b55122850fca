mod configuration;
mod error;
mod routes;
mod state;

use agentdeck::collaborators::DuckDuckGoSearch;
use agentdeck::credentials::MemoryCredentials;
use agentdeck::dashboard::{Dashboard, DashboardDeps};
use agentdeck::relay::TelegramRelayFactory;
use configuration::Settings;
use state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let client = reqwest::Client::builder()
        .timeout(settings.generation_timeout())
        .build()?;

    let deps = DashboardDeps::new(
        client.clone(),
        settings.endpoints(),
        Arc::new(MemoryCredentials::new()),
        Arc::new(TelegramRelayFactory::new(client.clone(), settings.relay.api_base.clone())),
    )
    .with_search(Arc::new(DuckDuckGoSearch::new(client, settings.search.base_url.clone())))
    .with_files_root(settings.files.root.clone())
    .with_intervals(settings.intervals());

    let state = AppState::new(Dashboard::new(deps));
    state.dashboard.start_background();

    let app = routes::configure(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.dashboard.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
}
