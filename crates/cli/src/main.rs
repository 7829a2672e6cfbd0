mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Settings;

/// Simulated CRM upstream and its local shadow mirror.
#[derive(Parser)]
#[command(
    name = "shadowcrm",
    version,
    about = "Simulated CRM upstream and its local shadow mirror"
)]
struct Cli {
    /// TOML file with [upstream] and [sync] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulated CRM HTTP server
    Serve {
        /// Port to listen on (default from config: 5555)
        #[arg(long)]
        port: Option<u16>,
        /// Upstream SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Seed demo data when the database file does not exist yet
        #[arg(long)]
        seed: bool,
    },

    /// Replace the upstream database contents with demo data
    Seed {
        /// Upstream SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "47")]
        contacts: usize,
        #[arg(long, default_value = "23")]
        deals: usize,
        /// Random seed; the same seed produces the same data
        #[arg(long, default_value = "42")]
        rng_seed: u64,
    },

    /// Operator controls of a running CRM server
    Admin {
        #[arg(value_enum)]
        action: AdminAction,
        /// Server root (default from config: http://localhost:5555)
        #[arg(long)]
        url: Option<String>,
    },

    /// Run one tool call and print its JSON result
    Tool {
        /// Tool name, e.g. crm_list_contacts
        name: String,
        /// JSON arguments
        #[arg(long, default_value = "{}")]
        args: String,
        /// Serve upstream calls from the configured database in this process
        #[arg(long)]
        in_process: bool,
    },

    /// Read tool calls as JSON lines from stdin, one result per line
    Session {
        /// Serve upstream calls from the configured database in this process
        #[arg(long)]
        in_process: bool,
    },

    /// Inspect the local mirror file
    Mirror {
        #[arg(value_enum)]
        action: MirrorAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum AdminAction {
    /// Enter outage mode
    Down,
    /// Leave outage mode
    Up,
    /// Flip outage mode
    Toggle,
    /// Clear the rate limit window
    Reset,
    /// Show admission status
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum MirrorAction {
    /// Lifecycle and row counts
    Status,
    /// Pending write ledger
    Pending,
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    settings.apply_env(|name| std::env::var(name).ok());

    let code = match cli.command {
        Commands::Serve { port, db, seed } => {
            if let Some(port) = port {
                settings.upstream.port = port;
            }
            if let Some(db) = db {
                settings.upstream.db_path = db;
            }
            commands::serve::cmd_serve(&settings, seed)
        }
        Commands::Seed {
            db,
            contacts,
            deals,
            rng_seed,
        } => {
            if let Some(db) = db {
                settings.upstream.db_path = db;
            }
            commands::seed::cmd_seed(
                &settings,
                shadowcrm_upstream::SeedOptions {
                    contacts,
                    deals,
                    rng_seed,
                },
            )
        }
        Commands::Admin { action, url } => {
            if let Some(url) = url {
                settings.sync.base_url = url;
            }
            commands::admin::cmd_admin(&settings, action)
        }
        Commands::Tool {
            name,
            args,
            in_process,
        } => commands::tool::cmd_tool(&settings, &name, &args, in_process),
        Commands::Session { in_process } => commands::session::cmd_session(&settings, in_process),
        Commands::Mirror { action } => commands::mirror::cmd_mirror(&settings, action),
    };
    process::exit(code);
}

/// Print a JSON value on stdout, one line.
pub(crate) fn print_json(value: &serde_json::Value) {
    println!("{}", value);
}

/// Build a tokio runtime or bail out.
pub(crate) fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    }
}
