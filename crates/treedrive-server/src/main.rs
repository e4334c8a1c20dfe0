//! TreeDrive Server -- single-threaded file storage server.
//!
//! Usage:
//!   treedrive-server                        # Run with default config
//!   treedrive-server --config path.toml     # Run with custom config
//!   treedrive-server --listen 0.0.0.0:9000  # Override listen address
//!   treedrive-server files                  # Print stored file metadata

use clap::{Parser, Subcommand};

use treedrive_server::config::ServerConfig;
use treedrive_server::expand_tilde;
use treedrive_storage::MetadataStore;

#[derive(Parser)]
#[command(name = "treedrive-server", about = "TreeDrive file storage server")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "treedrive-server.toml")]
    config: String,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    Run,
    /// Print the effective configuration as TOML
    Config,
    /// Print stored file metadata without starting the server
    Files,
}

// Single thread of control: the multiplexer handles one event at a time.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treedrive_server=info,treedrive_storage=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let mut cfg = ServerConfig::load_or_default(&config_path)?;
    if let Some(listen) = cli.listen {
        cfg.server.listen_addr = listen;
    }

    match cli.command {
        Some(Commands::Run) | None => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                config = %config_path.display(),
                listen = %cfg.server.listen_addr,
                "starting treedrive-server"
            );
            let mux = treedrive_server::bind(&cfg).await?;
            tracing::info!(addr = %mux.local_addr()?, "listening");
            mux.run().await;
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        Some(Commands::Files) => {
            let metadata = MetadataStore::open(&expand_tilde(&cfg.storage.metadata_file))?;
            println!("{}", serde_json::to_string_pretty(metadata.list())?);
        }
    }

    Ok(())
}
