use std::sync::Arc;

use tokio::net::TcpListener;

use memory_lane_backend::logging::init_tracing;
use memory_lane_backend::{routes, AppState, CloudinaryImageHost, Config, HostedIdentity, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    init_tracing(&config.logging.level);
    tracing::info!("Starting Memory Lane API");

    // Initialize components
    let store = Store::new(&config.database.url)?;
    tracing::info!("Opened database at {}", config.database.url);

    let identity = HostedIdentity::new(&config.identity, &config.webapp.url)?;
    match identity.jwks().refresh_keys().await {
        Ok(count) => tracing::info!("Loaded {} signing keys", count),
        Err(e) => tracing::warn!("Could not prefetch signing keys, will retry on demand: {}", e),
    }

    let images = CloudinaryImageHost::new(&config.images);

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        identity: Arc::new(identity),
        images: Arc::new(images),
    });

    let app = routes::app(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
