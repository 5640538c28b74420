mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, cursor::CursorSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "momsync",
    about = "Bridge observation specifications between MoM and the OTDB execution repository",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "MOMSYNC_CONFIG", default_value = "momsync.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller, dispatcher and inbound listener until interrupted
    Run,

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Decode a planning-system observation document and print the record
    Decode {
        /// XML file to decode
        file: PathBuf,
        /// Print the outbound XML for the decoded record instead
        #[arg(long)]
        outbound: bool,
    },

    /// Inspect or move the poll cursor
    Cursor {
        #[command(subcommand)]
        subcommand: CursorSubcommand,
    },

    /// Record per-beam angle times (`[+0,+3600]`) for a stored observation
    Angles {
        /// Observation mom2Id
        mom2_id: i64,
        /// Offsets in seconds from the observation start, one per beam
        list: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run => cmd::run::run(&cli.config),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
        Commands::Decode { file, outbound } => cmd::decode::run(&file, outbound),
        Commands::Cursor { subcommand } => cmd::cursor::run(&cli.config, subcommand, cli.json),
        Commands::Angles { mom2_id, list } => {
            cmd::angles::run(&cli.config, mom2_id, &list, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
