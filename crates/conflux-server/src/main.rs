use std::sync::Arc;

use conflux_engine::Engine;
use conflux_server::{build_app, AppState, ServerConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = ServerConfig::from_env()?;
    if let Some(uri) = &config.store_uri {
        info!("durable store configured at {uri}");
    } else {
        warn!("no store URI configured, using in-memory stores");
    }
    if let Some(uri) = &config.cache_uri {
        info!("definition cache configured at {uri}");
    }

    let engine = Arc::new(Engine::builder().build());
    let app = build_app(AppState {
        engine: Arc::clone(&engine),
    });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("conflux listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    engine.shutdown().await;
    Ok(())
}

fn init_logging() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
