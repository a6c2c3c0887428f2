//! Binary entrypoint for the flowgraph server.
//!
//! Configuration comes from environment variables; see
//! [`flowgraph_server::config`]. Logging honours `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flowgraph_server::config::ServerConfig;
use flowgraph_server::router::build_router;
use flowgraph_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flowgraph_server=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        db = %config.db_path.display(),
        work_root = %config.work_root.display(),
        graph_mode = %config.graph_mode,
        "configuration loaded"
    );

    let state = AppState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("flowgraph server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
