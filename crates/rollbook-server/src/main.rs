use clap::Parser;
use rollbook_core::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rollbook-server", about = "HTTP JSON API for the Rollbook registry")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8462)]
    port: u16,

    /// Path to the registry directory.
    #[arg(long, default_value = "./rollbook-data")]
    registry: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let engine = match Engine::open(&cli.registry) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("error: failed to open registry: {e}");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting rollbook-server on {addr}");
    info!("registry directory: {}", cli.registry.display());

    rollbook_server::run_server(&engine, &addr);
}
