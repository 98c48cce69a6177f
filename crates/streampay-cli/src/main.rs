// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STREAMPAY CLI - Payment streams from the terminal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use streampay_client::ClientConfig;
use streampay_core::{IntervalUnit, StreamId};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "streampay")]
#[command(about = "StreamPay CLI - Token payment streams", long_about = None)]
#[command(version)]
struct Cli {
    /// Ledger RPC endpoint (overrides the config file)
    #[arg(short, long, global = true, env = "STREAMPAY_RPC_URL")]
    rpc: Option<String>,

    /// Config directory (default: ~/.streampay)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Caller address the portfolio and mutations are relative to
    #[arg(short, long, global = true, env = "STREAMPAY_ADDRESS")]
    address: Option<String>,

    /// Sign without asking for confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the ledger once and list your streams
    Streams {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the portfolio refreshed and print each update
    Watch {
        /// Seconds between refreshes (default from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Token balance of an address (default: your address)
    Balance {
        #[arg(value_name = "ADDRESS")]
        holder: Option<String>,
    },

    /// Open a new stream
    Create {
        /// Recipient address
        #[arg(short, long)]
        to: String,

        /// Tokens released per interval (e.g. 0.5)
        #[arg(long)]
        rate: String,

        /// Tokens committed up front
        #[arg(short, long)]
        deposit: String,

        /// Interval length, in `--unit`
        #[arg(short, long, default_value_t = 1)]
        every: u64,

        #[arg(short, long, value_enum, default_value_t = UnitArg::Blocks)]
        unit: UnitArg,
    },

    /// Withdraw what a stream owes you
    Withdraw { id: StreamId },

    /// Pause a stream you send
    Pause { id: StreamId },

    /// Resume a paused stream you send
    Resume { id: StreamId },

    /// Add funds to a stream you send
    TopUp {
        id: StreamId,

        /// Tokens to add
        #[arg(long)]
        amount: String,
    },

    /// Cancel a stream you send, settling what is owed and refunding the rest
    Cancel { id: StreamId },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnitArg {
    Blocks,
    Hours,
    Days,
}

impl From<UnitArg> for IntervalUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Blocks => IntervalUnit::Blocks,
            UnitArg::Hours => IntervalUnit::Hours,
            UnitArg::Days => IntervalUnit::Days,
        }
    }
}

fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("config.toml")
}

/// File, then environment, then flags.
fn effective_config(
    config_dir: &Path,
    rpc: Option<String>,
    address: Option<String>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::load_or_default(&config_path(config_dir))?.apply_env()?;
    if let Some(rpc) = rpc {
        config.rpc_url = rpc;
    }
    if let Some(address) = address.filter(|a| !a.is_empty()) {
        config.address = Some(address);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    print_banner();

    let config_dir = cli.config_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".streampay")
    });

    if let Commands::Config { action } = cli.command {
        return commands::config::handle(action, &config_dir).await;
    }

    let config = effective_config(&config_dir, cli.rpc, cli.address)?;
    tracing::debug!(rpc = %config.rpc_url, network = %config.network, "configuration loaded");

    match cli.command {
        Commands::Streams { json } => commands::streams::handle(&config, json).await?,
        Commands::Watch { interval } => commands::watch::handle(&config, interval).await?,
        Commands::Balance { holder } => {
            commands::balance::handle(&config, holder.as_deref()).await?
        }
        Commands::Create {
            to,
            rate,
            deposit,
            every,
            unit,
        } => {
            let interval = IntervalUnit::from(unit).to_blocks(every);
            commands::mutations::create(&config, cli.yes, &to, &rate, &deposit, interval).await?
        }
        Commands::Withdraw { id } => commands::mutations::withdraw(&config, cli.yes, id).await?,
        Commands::Pause { id } => commands::mutations::pause(&config, cli.yes, id).await?,
        Commands::Resume { id } => commands::mutations::resume(&config, cli.yes, id).await?,
        Commands::TopUp { id, amount } => {
            commands::mutations::top_up(&config, cli.yes, id, &amount).await?
        }
        Commands::Cancel { id } => commands::mutations::cancel(&config, cli.yes, id).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        "╔═══════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║        STREAMPAY - payment streams CLI        ║"
            .cyan()
            .bold()
    );
    println!(
        "{}",
        "╚═══════════════════════════════════════════════╝".cyan()
    );
    println!();
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────
