//! deploytar - Entry Point
//!
//! An HTTP server that unpacks uploaded tar archives into a confined directory
//! tree and lists its contents.

use log::{error, info};

use deploytar::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Launching deploytar server...");

    let server = match Server::new(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed on {}: {}", config.http_socket(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!("Server terminated with error: {}", e);
        std::process::exit(1);
    }
}
