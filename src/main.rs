use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use affinity::config::Config;
use affinity::model::ItemId;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Content-based recommendations from approve/reject signals", long_about = None)]
struct Cli {
    /// Configuration file (default: ./affinity.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print recommendations for a user
    Recommend {
        /// User id
        user: String,

        /// Number of items
        #[arg(short, long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,

        /// Keep the user's own items in the result
        #[arg(long)]
        include_own: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Replay item and reaction events from a JSON-lines file ("-" for stdin)
    Ingest {
        input: PathBuf,

        /// Output the report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add or inspect items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Embed and store a new item
    Add {
        #[arg(long)]
        id: ItemId,

        #[arg(long)]
        author: String,

        /// Item text
        text: String,
    },

    /// Show a stored item
    Show { id: ItemId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    affinity::logging::init(&config.logging.level);

    match cli.command {
        Commands::Serve { host, port } => commands::serve::execute(config, host, port)?,
        Commands::Recommend {
            user,
            limit,
            include_own,
            json,
        } => commands::recommend::execute(&config, &user, limit, include_own, json)?,
        Commands::Ingest { input, json } => commands::ingest::execute(&config, &input, json)?,
        Commands::Item { command } => match command {
            ItemCommands::Add { id, author, text } => {
                commands::item::add(&config, id, author, text)?
            }
            ItemCommands::Show { id } => commands::item::show(&config, id)?,
        },
        Commands::Config => commands::config::execute(&config)?,
    }

    Ok(())
}
