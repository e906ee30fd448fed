//! Runnable matchmaking server binary.
//!
//! Honors `PORT` (default 8080) and `RUST_LOG` for log filtering. Ctrl-C
//! triggers a graceful shutdown that notifies room occupants.

use cardlink_server::{CardlinkServer, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let server = CardlinkServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .build()
        .await?;
    tracing::info!(port, "Cardlink matchmaking server listening");

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await
}
