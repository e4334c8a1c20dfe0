//! TreeDrive Client -- interactive shell.
//!
//! Usage:
//!   treedrive-client                          # Connect to 127.0.0.1:8240
//!   treedrive-client --server host:8240       # Override server address
//!   treedrive-client --config client.toml     # Custom config

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use treedrive_client::config::ClientConfig;
use treedrive_client::shell::{self, Command, HELP};
use treedrive_client::{Client, ClientError};
use treedrive_protocol::ack;

#[derive(Parser)]
#[command(name = "treedrive-client", about = "TreeDrive file storage client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "treedrive-client.toml")]
    config: PathBuf,

    /// Server address, overrides the config file
    #[arg(short, long)]
    server: Option<String>,
}

enum Flow {
    Continue,
    Exit,
}

struct Session {
    client: Client,
    downloads_dir: PathBuf,
    user: Option<String>,
}

impl Session {
    async fn execute(&mut self, command: Command) -> Result<Flow, ClientError> {
        if command.requires_login() && self.user.is_none() {
            return Err(ClientError::NotLoggedIn);
        }
        let user = self.user.clone().unwrap_or_default();

        match command {
            Command::Login(name) => {
                let reply = self.client.login(&name).await?;
                if reply == ack::LOGIN_OK {
                    self.user = Some(name);
                }
                println!("Server response: {reply}");
            }
            Command::Push(path) => {
                println!("Uploading '{}' ...", path.display());
                let report = self.client.upload(&path, &user).await?;
                println!(
                    "Uploaded '{}': {} bytes in {} chunk(s)",
                    report.filename, report.bytes, report.chunks
                );
            }
            Command::Get(name) => {
                let report = self
                    .client
                    .download(&name, &user, &self.downloads_dir)
                    .await?;
                println!(
                    "Download complete: {} ({} bytes)",
                    report.path.display(),
                    report.bytes
                );
            }
            Command::List => {
                let files = self.client.list().await?;
                if files.is_empty() {
                    println!("No files stored.");
                }
                for f in files {
                    println!(
                        "{:<30} {:<16} {:>10}  {}",
                        f.filename,
                        f.owner,
                        shell::format_size(f.size),
                        f.timestamp
                    );
                }
            }
            Command::Delete(name) => {
                let reply = self.client.delete(&name, &user).await?;
                println!("Server response: {reply}");
            }
            Command::Ls(dir) => {
                let cwd = std::env::current_dir()?;
                let target = dir.map(|d| cwd.join(d)).unwrap_or(cwd);
                for line in shell::list_dir(&target)? {
                    println!("{line}");
                }
            }
            Command::Cd(dir) => {
                let cwd = std::env::current_dir()?;
                let home = std::env::var_os("HOME").map(PathBuf::from);
                let target = shell::resolve_dir(&cwd, dir.as_deref(), home.as_deref());
                let now = shell::change_dir(&target)?;
                println!("Current directory: {}", now.display());
            }
            Command::Pwd => {
                println!("{}", std::env::current_dir()?.display());
            }
            Command::Help => println!("{HELP}"),
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treedrive_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = ClientConfig::load_or_default(&cli.config)?;
    if let Some(server) = cli.server {
        cfg.client.server_addr = server;
    }
    tracing::debug!(server = %cfg.client.server_addr, "client configured");

    let mut session = Session {
        client: Client::from_config(&cfg.client),
        downloads_dir: Path::new(&cfg.client.downloads_dir).to_path_buf(),
        user: None,
    };

    println!("TreeDrive client ({}). {HELP}", session.client.server_addr());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nExiting client.");
            break;
        };

        let command = match shell::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        match session.execute(command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => {
                println!("Exiting client.");
                break;
            }
            Err(ClientError::ConnectionRefused(_)) => {
                println!("Connection Error: Could not connect to the server. Is the server running?");
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}
