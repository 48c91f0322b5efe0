use clap::Parser;
use log::{error, info};
use server::config::Args;
use server::network::{Server, ServerMessage};

/// Parses arguments, binds the listener and runs the relay until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.into_config();
    info!(
        "Starting relay on {} (max {} connections, {:?})",
        config.bind_addr, config.max_connections, config.policy
    );

    let mut server = Server::bind(config).await?;

    let shutdown = server.shutdown_sender();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                let _ = shutdown.send(ServerMessage::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;

    Ok(())
}
