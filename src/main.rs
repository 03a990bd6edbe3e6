use chatlog::{create_router, logging, registry, Config, LoggerOptions};
use tracing::info;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => chatlog::fatal!("invalid configuration: {e}"),
    };

    if let Err(e) = chatlog::configure(
        LoggerOptions::new()
            .format(config.format)
            .show_caller(config.show_caller),
    ) {
        chatlog::warning!("failed to apply log settings: {e}");
    }
    if let Err(e) = chatlog::initialize(config.init_options()) {
        chatlog::warning!("logging degraded: {e}");
    }
    if let Err(e) = logging::init(registry::global()) {
        chatlog::warning!("tracing bridge not installed: {e}");
    }

    let listener = match tokio::net::TcpListener::bind(&config.server_address).await {
        Ok(listener) => listener,
        Err(e) => chatlog::fatal!("failed to bind {}: {e}", config.server_address),
    };

    info!(address = %config.server_address, "starting server");
    let served = axum::serve(listener, create_router())
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = served {
        chatlog::error!("server error: {e}");
    }

    info!("server stopped");
    chatlog::shutdown();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        chatlog::error!("failed to listen for shutdown signal: {e}");
    }
}
