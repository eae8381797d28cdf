//! Messaging console bootstrap - pair a device, sync contacts and wait until
//! the console is ready.

mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console_config_and_utils::{init_logging, Config, Paths};

/// Messaging console command-line interface.
#[derive(Parser)]
#[command(name = "messaging-console")]
#[command(about = "Pair a messaging bridge session and synchronize contacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, logs and cache. Defaults to ~/.messaging-console
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, pair and synchronize until the console is ready
    Run {
        #[arg(long, env = "CONSOLE_USER_ID")]
        user_id: String,
        #[arg(long, env = "CONSOLE_TENANT_ID")]
        tenant_id: String,
        /// Bearer token for the bridge and the contact store
        #[arg(long, env = "CONSOLE_ACCESS_TOKEN", default_value = "")]
        access_token: String,
        /// Request a phone pairing code instead of scanning the QR code
        #[arg(long)]
        phone: Option<String>,
    },
    /// Ask the bridge for the tenant's session status
    Status {
        #[arg(long, env = "CONSOLE_TENANT_ID")]
        tenant_id: String,
        #[arg(long, env = "CONSOLE_ACCESS_TOKEN")]
        access_token: Option<String>,
    },
    /// Request a phone pairing code
    Pair {
        #[arg(long, env = "CONSOLE_TENANT_ID")]
        tenant_id: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "CONSOLE_ACCESS_TOKEN")]
        access_token: Option<String>,
    },
    /// Inspect or clear the local contact cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the cached contacts for a user
    Show {
        #[arg(long, env = "CONSOLE_USER_ID")]
        user_id: String,
    },
    /// Delete the cached contacts for a user
    Clear {
        #[arg(long, env = "CONSOLE_USER_ID")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level, Some(&paths.log_file()));

    match cli.command {
        Commands::Run {
            user_id,
            tenant_id,
            access_token,
            phone,
        } => {
            let options = app::RunOptions {
                user_id,
                tenant_id,
                access_token,
                phone,
            };
            app::run_bootstrap(&config, &paths, options).await?;
        }
        Commands::Status {
            tenant_id,
            access_token,
        } => {
            commands::print_status(&config, &tenant_id, access_token).await?;
        }
        Commands::Pair {
            tenant_id,
            phone,
            access_token,
        } => {
            commands::print_pairing_code(&config, &tenant_id, &phone, access_token).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Show { user_id } => commands::show_cache(&paths, &user_id)?,
            CacheAction::Clear { user_id } => commands::clear_cache(&paths, &user_id)?,
        },
    }

    Ok(())
}
