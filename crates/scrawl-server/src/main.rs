use tracing_subscriber::EnvFilter;

use scrawl_server::build_app;
use scrawl_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {listen_addr}: {e}");
            std::process::exit(1);
        },
    };

    tracing::info!("Scrawl server listening on {listen_addr}");

    let shutdown = state.shutdown.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = shutdown.cancelled() => {},
        }
    });

    if let Err(e) = serve.await {
        tracing::error!(error = %e, "Server error");
    }

    // Drain rooms before exiting so timers stop and sockets close cleanly.
    state.registry.shutdown().await;
}
