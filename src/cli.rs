use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "matchcast", author, version, about = "Live football match simulation with real-time rooms", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    pub config_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulation and the WebSocket gateway
    Serve {
        /// Override the gateway host
        #[arg(long)]
        host: Option<String>,

        /// Override the gateway port
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep matches in memory (seeded on start) instead of SQLite
        #[arg(long)]
        in_memory: bool,
    },

    /// Insert reference teams and live matches into an empty database
    Seed,

    /// List all matches, newest first
    List,

    /// Show one match with its events and statistics
    Show {
        /// Match ID
        match_id: String,
    },

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
