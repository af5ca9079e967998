//! Command-line entry point: web UI, terminal broadcast and config check.

mod clients;

use broadcaster_core::config::{ALL_KEYS, REQUIRED_KEYS};
use broadcaster_core::{
    BroadcasterConfig, ConfigResolver, EnvProvider, RunEvent, SecretsFileProvider,
};
use broadcaster_engine::{Broadcaster, RecipientSource, SpreadsheetSource};
use broadcaster_gateway::connection::ConnectionManager;
use broadcaster_gateway::{AuthConfig, GatewayServer, RunLauncher, RunSettings};
use clap::{Parser, Subcommand};
use clients::LiveClients;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "broadcaster",
    about = "Send one message to every spreadsheet row over Telegram and email"
)]
struct Cli {
    /// Secrets file consulted after the environment
    #[arg(long, global = true, default_value = "secrets.toml")]
    secrets: PathBuf,

    /// Dotenv file loaded into the environment at startup
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Recipient workbook (overrides config)
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Run one broadcast from the terminal
    Send {
        /// Message text
        #[arg(short, long, required_unless_present = "message_file", conflicts_with = "message_file")]
        message: Option<String>,
        /// Read the message text from a file
        #[arg(long)]
        message_file: Option<PathBuf>,
        /// Recipient workbook (overrides config)
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Show where each setting comes from
    Config,
}

fn build_resolver(secrets: &Path) -> anyhow::Result<ConfigResolver> {
    Ok(ConfigResolver::new()
        .with_provider(EnvProvider)
        .with_provider(SecretsFileProvider::load(secrets)?))
}

/// One line per known key: source, or `missing` / `default`.
fn describe_config(resolver: &ConfigResolver) -> Vec<String> {
    ALL_KEYS
        .iter()
        .map(|key| match resolver.lookup(key) {
            Some((_, source)) => format!("  {key:<22} set ({source})"),
            None if REQUIRED_KEYS.contains(key) => format!("  {key:<22} MISSING"),
            None => format!("  {key:<22} default"),
        })
        .collect()
}

async fn read_message(message: Option<String>, message_file: Option<PathBuf>) -> anyhow::Result<String> {
    match (message, message_file) {
        (Some(message), _) => Ok(message),
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read message file '{}': {e}", path.display())),
        (None, None) => anyhow::bail!("No message given"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    if cli.env_file.exists() {
        if let Err(e) = dotenvy::from_path(&cli.env_file) {
            warn!(path = %cli.env_file.display(), error = %e, "Failed to load env file");
        }
    }
    let resolver = build_resolver(&cli.secrets)?;

    if let Commands::Config = cli.command {
        println!("Configuration:");
        for line in describe_config(&resolver) {
            println!("{line}");
        }
        return match BroadcasterConfig::resolve(&resolver) {
            Ok(_) => {
                println!("\nAll required settings present.");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("{e}")),
        };
    }

    let config = BroadcasterConfig::resolve(&resolver).map_err(|e| {
        anyhow::anyhow!("{e}\nLocally: check your .env file. Otherwise: check {}", cli.secrets.display())
    })?;

    match cli.command {
        Commands::Serve { host, port, data } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            let data = data.unwrap_or_else(|| config.data_file.clone());

            let connections = ConnectionManager::new();
            let launcher = RunLauncher::new(
                Arc::new(LiveClients::new(&config)),
                Arc::new(SpreadsheetSource::new(data.clone())),
                RunSettings {
                    subject: config.email_subject.clone(),
                    country_code: config.country_code.clone(),
                },
                connections.clone(),
            );
            let auth = AuthConfig::new(config.gateway.api_keys.clone());
            if auth.is_enabled() {
                info!(keys = auth.api_keys.len(), "API key auth enabled");
            }
            let app = GatewayServer::build_with_auth(launcher, connections, auth);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, data = %data.display(), "Broadcaster UI listening");
            axum::serve(listener, app).await?;
        }
        Commands::Send {
            message,
            message_file,
            data,
        } => {
            let message = read_message(message, message_file).await?;
            if message.trim().is_empty() {
                anyhow::bail!("Message is empty!");
            }
            let source = SpreadsheetSource::new(data.unwrap_or_else(|| config.data_file.clone()));
            let rows = source.load().await?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        RunEvent::StateChanged { state } => info!(?state, "Run state"),
                        RunEvent::RowCompleted {
                            completed,
                            total,
                            line,
                            ..
                        } => println!("[{completed}/{total}] {line}"),
                        RunEvent::Completed { stats, .. } => {
                            println!("\nBroadcast Complete!");
                            println!("  Telegram: {} sent, {} failed", stats.tg_ok, stats.tg_fail);
                            println!("  Email:    {} sent, {} failed", stats.em_ok, stats.em_fail);
                        }
                        RunEvent::Aborted { .. } => {}
                    }
                }
            });

            let result = Broadcaster::from_config(&config, &LiveClients::new(&config))
                .with_events(tx)
                .run(&rows, &message)
                .await;
            let _ = printer.await;
            result?;
        }
        Commands::Config => {}
    }

    Ok(())
}
