//! Shrink application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open (and on first run seed) the SQLite warehouse
//! 3. Load the markdown knowledge base
//! 4. Build the optional remote model adapter
//! 5. Start the axum API server, or run a maintenance subcommand

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use shrink_api::{start_server, AppState};
use shrink_chat::{HttpModel, RemoteModel};
use shrink_core::config::ShrinkConfig;
use shrink_knowledge::{KnowledgeBase, KnowledgeIndex};
use shrink_warehouse::{seed_sample_data, Database, SqliteWarehouse};

use crate::cli::{CliArgs, Command, KbCommand};

const INTRODUCTION: &str = "# Shrink Documentation\n\n\
This is the default documentation file. Add markdown files to this \
directory, or to category subdirectories, to extend the assistant's \
knowledge base.\n";

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        let home = cli::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// `path` as is when absolute, otherwise under `base`.
fn under(base: &Path, path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Create the documentation directory with an introduction file when it is
/// missing. Failure is logged and otherwise ignored.
fn ensure_doc_dir(doc_dir: &Path) {
    let intro = doc_dir.join("introduction.md");
    if intro.exists() {
        return;
    }
    let result = std::fs::create_dir_all(doc_dir).and_then(|_| std::fs::write(&intro, INTRODUCTION));
    match result {
        Ok(()) => tracing::info!(path = %intro.display(), "Created default documentation"),
        Err(e) => {
            tracing::warn!(path = %doc_dir.display(), error = %e, "Could not create documentation directory")
        }
    }
}

fn load_knowledge(config: &ShrinkConfig, doc_dir: &Path) -> Result<KnowledgeIndex, Box<dyn std::error::Error>> {
    ensure_doc_dir(doc_dir);
    let mut index = KnowledgeIndex::new(&config.knowledge)?;
    match index.load_directory(doc_dir) {
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Knowledge base empty"),
    }
    Ok(index)
}

fn open_warehouse(db_path: &Path) -> Result<Database, Box<dyn std::error::Error>> {
    let db = Database::new(db_path)?;
    let seeded = seed_sample_data(&db)?;
    if seeded.stores > 0 {
        tracing::info!(
            stores = seeded.stores,
            markdowns = seeded.markdowns,
            "Seeded empty warehouse with sample data"
        );
    }
    Ok(db)
}

fn run_kb(action: KbCommand, index: &KnowledgeIndex) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        KbCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&index.statistics())?);
        }
        KbCommand::Search {
            query,
            category,
            limit,
        } => {
            let hits = index.search_filtered(&query, category.as_deref(), limit)?;
            if hits.is_empty() {
                println!("{}", shrink_chat::NO_KNOWLEDGE_RESULTS);
            } else {
                println!("{}", shrink_chat::format_knowledge(&hits));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ShrinkConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Shrink v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let doc_dir = under(&data_dir, &config.knowledge.doc_directory);
    let db_path = under(&data_dir, &config.warehouse.path);

    match args.command() {
        Command::Kb { action } => {
            let index = load_knowledge(&config, &doc_dir)?;
            run_kb(action, &index)
        }
        Command::Seed => {
            let db = Database::new(&db_path)?;
            let summary = seed_sample_data(&db)?;
            println!(
                "stores: {}, departments: {}, markdowns: {}, inventory positions: {}",
                summary.stores, summary.departments, summary.markdowns, summary.inventory_positions
            );
            Ok(())
        }
        Command::Serve => {
            let db = open_warehouse(&db_path)?;
            let warehouse = SqliteWarehouse::new(Arc::new(db), config.warehouse.default_row_limit);
            let knowledge = load_knowledge(&config, &doc_dir)?;

            let model: Option<Arc<dyn RemoteModel>> = match HttpModel::from_config(&config.model)? {
                Some(m) => {
                    tracing::info!(model = %m.name(), "Remote model configured");
                    Some(Arc::new(m))
                }
                None => {
                    tracing::info!("No model endpoint configured, answering from the knowledge base");
                    None
                }
            };

            let state = AppState::new(config, Arc::new(warehouse), Arc::new(knowledge), model);
            start_server(state).await?;
            Ok(())
        }
    }
}
