#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use caseworker_server::{DemoUpstream, ServerConfig, demo_upstream};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caseworker-server")]
#[command(version, about = "Caseworker chat relay and asset server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML config file (defaults to ./caseworker.toml when present)
    #[arg(long, global = true, env = "CASEWORKER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the app and relay chat requests (default)
    Serve,

    /// Run a stand-in completion backend that streams a canned reply
    DemoUpstream {
        #[arg(long, env = "PYTHON_BACKEND_PORT", default_value_t = 8000)]
        port: u16,

        /// Delay before each streamed chunk, in milliseconds
        #[arg(long, default_value_t = 0)]
        chunk_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,caseworker_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = ServerConfig::load(cli.config.as_deref())?;
            caseworker_server::serve(config).await
        }
        Commands::DemoUpstream {
            port,
            chunk_delay_ms,
        } => {
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            tracing::info!("Demo upstream running at http://localhost:{}", port);
            let upstream = DemoUpstream::default()
                .with_chunk_delay(std::time::Duration::from_millis(chunk_delay_ms));
            demo_upstream::run(listener, upstream).await?;
            Ok(())
        }
    }
}
