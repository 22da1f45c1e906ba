//! CLI argument definitions for the `shrink` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shrink dashboard API and assistant.
#[derive(Parser, Debug)]
#[command(name = "shrink", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for the warehouse database and documents.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP API (default).
    Serve,
    /// Inspect the knowledge base.
    Kb {
        #[command(subcommand)]
        action: KbCommand,
    },
    /// Load sample data into an empty warehouse.
    Seed,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KbCommand {
    /// Print document, chunk and category counts.
    Stats,
    /// Run a search and print the hits.
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Priority: --config flag > SHRINK_CONFIG env var > ~/.shrink/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SHRINK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > SHRINK_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, std::env::var("SHRINK_PORT").ok())
    }

    fn resolve_port_with(&self, config_port: u16, env_port: Option<String>) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        env_port
            .and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".shrink").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}
