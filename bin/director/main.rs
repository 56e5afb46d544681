//! Testnet Director
//!
//! Gathers validator registrations per testnet and serves the resulting
//! genesis and address book files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use testnet_director::config::DEFAULT_DIRECTOR_DIR;
use testnet_director::{version, DirectorConfig, LogFormat, Node, TestnetConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Testnet written by `init` as a starting point
const EXAMPLE_CHAIN_ID: &str = "testnet-1";

#[derive(Parser, Debug)]
#[command(name = "director")]
#[command(about = "Testnet Director - validator sign-up and genesis distribution")]
struct Args {
    /// Home directory holding config/ and data/
    #[arg(long, global = true, env = "DIRECTOR_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Run the director
    Start,
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let home = match args.home {
        Some(home) => home,
        None => dirs::home_dir()
            .context("Cannot determine home directory, use --home")?
            .join(DEFAULT_DIRECTOR_DIR),
    };

    match args.command {
        Command::Init { force } => init(&home, force),
        Command::Start => start(&home).await,
        Command::Version => {
            println!("{}", version::version());
            Ok(())
        }
    }
}

fn init(home: &Path, force: bool) -> Result<()> {
    let path = DirectorConfig::config_file(home);
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let mut config = DirectorConfig::default();
    config.testnets.insert(
        EXAMPLE_CHAIN_ID.to_string(),
        TestnetConfig::new(4, Duration::from_secs(3600)),
    );
    config
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn start(home: &Path) -> Result<()> {
    let path = DirectorConfig::config_file(home);
    let config = DirectorConfig::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_home(home);

    init_logging(&config)?;

    info!("Starting Testnet Director");
    info!("  Home: {}", home.display());
    info!("  Testnets: {}", config.testnets.len());
    info!("  RPC: {}", config.rpc.listen_address);

    let mut node = Node::new(config)?;
    node.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    node.stop().await;
    Ok(())
}

fn init_logging(config: &DirectorConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log_level: {}", config.log_level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
