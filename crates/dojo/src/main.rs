//! # dojo CLI
//!
//! Command-line interface for the Sales Dojo knowledge base.
//!
//! Each company gets its own knowledge base of reference material that the
//! training assistant draws on during conversations. This binary ingests
//! documents, edits entries, and runs the same searches the assistant does.
//!
//! ## Commands
//!
//! - `dojo ingest <COMPANY> <FILES>...` - Extract, chunk, embed and store documents
//! - `dojo add <COMPANY> <CONTENT>` - Store a typed-in entry
//! - `dojo search <COMPANY> <QUERY>` - Search a company's knowledge
//! - `dojo prompt <COMPANY> <MESSAGE>` - Print an enriched prompt
//! - `dojo stats <COMPANY>` - Show knowledge base readiness
//!
//! ## Examples
//!
//! ```bash
//! # Ingest a pricing sheet and a call script
//! dojo ingest 4f1c... pricing.xlsx discovery-script.docx
//!
//! # Search with JSON output
//! dojo --format json search 4f1c... "enterprise discount policy"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dojo_core::{CompanyId, KnowledgeEntry, KnowledgeStats, SourceType};
use dojo_embed::select_embedder;
use dojo_extract::ExtractorRegistry;
use dojo_ingest::{IngestUpdate, IngestionPipeline, UploadOutcome, UploadStatus, UploadedFile};
use dojo_retrieval::{ConversationTurn, RetrievalService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

mod backend;
mod config;

use backend::Backend;
use config::{Config, LoggingConfig, ensure_parent};

#[derive(Parser)]
#[command(name = "dojo")]
#[command(about = "Knowledge base ingestion and retrieval for sales training")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/dojo/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into a company's knowledge base
    Ingest {
        /// Company id
        company: CompanyId,

        /// Files to ingest (txt, csv, pdf, docx, xlsx, xls)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Source type recorded on every entry
        #[arg(short, long, default_value = "document")]
        source_type: SourceType,

        /// Override the configured maximum chunk size
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Store a single typed-in entry
    Add {
        /// Company id
        company: CompanyId,

        /// Entry text
        content: String,

        /// Source type
        #[arg(short, long, default_value = "manual")]
        source_type: SourceType,

        /// Source name shown in search results
        #[arg(short = 'n', long, default_value = "manual")]
        source_name: String,
    },

    /// Replace an entry's content
    Update {
        /// Company id
        company: CompanyId,

        /// Entry id
        id: Uuid,

        /// New entry text
        content: String,
    },

    /// Delete one entry
    Delete {
        /// Company id
        company: CompanyId,

        /// Entry id
        id: Uuid,
    },

    /// Delete every entry from one source
    DeleteSource {
        /// Company id
        company: CompanyId,

        /// Source name (the sanitized filename for documents)
        source_name: String,
    },

    /// Search a company's knowledge base
    Search {
        /// Company id
        company: CompanyId,

        /// Query text
        query: String,

        /// Minimum similarity (exclusive)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print a message wrapped with relevant knowledge
    Prompt {
        /// Company id
        company: CompanyId,

        /// User message
        message: String,

        /// Earlier conversation turns, oldest first
        #[arg(long = "history")]
        history: Vec<String>,
    },

    /// Show knowledge base statistics
    Stats {
        /// Company id
        company: CompanyId,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for search results.
#[derive(Serialize)]
struct SearchOutput {
    query: String,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    id: Uuid,
    source_type: SourceType,
    source_name: String,
    similarity: f32,
    content: String,
}

/// Output structure for ingestion.
#[derive(Serialize)]
struct IngestOutput {
    company_id: CompanyId,
    stored: u64,
    files: Vec<UploadOutcome>,
}

/// Output structure for entry edits.
#[derive(Serialize)]
struct EntryOutput {
    id: Uuid,
    source_type: SourceType,
    source_name: String,
    content: String,
    created_at: String,
}

impl From<&KnowledgeEntry> for EntryOutput {
    fn from(entry: &KnowledgeEntry) -> Self {
        Self {
            id: entry.id,
            source_type: entry.source_type,
            source_name: entry.source_name.clone(),
            content: entry.content.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// The shared component stack.
struct Components {
    backend: Backend,
    pipeline: IngestionPipeline,
    retrieval: RetrievalService,
}

async fn create_components(config: &Config) -> Result<Components> {
    let settings = config.embedding.to_settings();
    let embedder = select_embedder(&settings).context("Failed to create embedder")?;

    let backend = Backend::open(&config.store, settings.dimension).await?;
    let store = backend.store();

    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(ExtractorRegistry::with_defaults()),
        embedder.clone(),
        config.ingest_config(),
    );
    let retrieval = RetrievalService::new(store, embedder, config.retrieval.clone());

    Ok(Components {
        backend,
        pipeline,
        retrieval,
    })
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    match logging.file {
        Some(ref path) => {
            ensure_parent(path)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config from file or CLI-specified path
    let config = if let Some(ref path) = cli.config {
        Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Ingest {
            company,
            files,
            source_type,
            chunk_size,
        } => {
            let mut config = config;
            if let Some(size) = chunk_size {
                config.chunking.max_chunk_size = size;
            }
            let components = create_components(&config).await?;

            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                uploads.push(UploadedFile::new(filename, data));
            }

            // Progress reporter
            let mut updates = components.pipeline.subscribe();
            let progress = tokio::spawn(async move {
                while let Ok(update) = updates.recv().await {
                    match update {
                        IngestUpdate::IngestionStarted { source_name, .. } => {
                            info!("Ingesting {}", source_name);
                        }
                        IngestUpdate::DocumentFailed {
                            source_name, error, ..
                        } => {
                            warn!("Error: {}: {}", source_name, error);
                        }
                        IngestUpdate::DocumentIngested { .. }
                        | IngestUpdate::SourceDeleted { .. } => {}
                    }
                }
            });

            let outcomes = components
                .pipeline
                .ingest_uploads(&company, source_type, uploads)
                .await;
            components.backend.persist().await?;
            drop(components);
            let _ = progress.await;

            let stored: u64 = outcomes
                .iter()
                .map(|o| match o.status {
                    UploadStatus::Stored { entry_count } => entry_count,
                    _ => 0,
                })
                .sum();

            match cli.format {
                OutputFormat::Json => {
                    let output = IngestOutput {
                        company_id: company,
                        stored,
                        files: outcomes,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    for outcome in &outcomes {
                        match outcome.status {
                            UploadStatus::Stored { entry_count } => {
                                println!("  stored   {} ({} entries)", outcome.filename, entry_count);
                            }
                            UploadStatus::Rejected { ref reason } => {
                                println!("  rejected {}: {}", outcome.filename, reason);
                            }
                            UploadStatus::Failed { ref error } => {
                                println!("  failed   {}: {}", outcome.filename, error);
                            }
                        }
                    }
                    println!("{} entries stored", stored);
                }
            }
        }

        Commands::Add {
            company,
            content,
            source_type,
            source_name,
        } => {
            let components = create_components(&config).await?;
            let entry = components
                .pipeline
                .add_single_entry(&content, &company, source_type, &source_name)
                .await
                .context("Failed to add entry")?;
            components.backend.persist().await?;
            print_entry(cli.format, "Added", &entry)?;
        }

        Commands::Update {
            company,
            id,
            content,
        } => {
            let components = create_components(&config).await?;
            let entry = components
                .pipeline
                .update_entry(&company, id, &content)
                .await
                .context("Failed to update entry")?;
            components.backend.persist().await?;
            print_entry(cli.format, "Updated", &entry)?;
        }

        Commands::Delete { company, id } => {
            let components = create_components(&config).await?;
            components
                .pipeline
                .delete_entry(&company, id)
                .await
                .context("Failed to delete entry")?;
            components.backend.persist().await?;

            match cli.format {
                OutputFormat::Json => println!(r#"{{"deleted": "{id}"}}"#),
                OutputFormat::Text => println!("Deleted {id}"),
            }
        }

        Commands::DeleteSource {
            company,
            source_name,
        } => {
            let components = create_components(&config).await?;
            let removed = components
                .pipeline
                .delete_source(&company, &source_name)
                .await
                .context("Failed to delete source")?;
            components.backend.persist().await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "source_name": source_name,
                        "removed": removed,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => println!("Removed {removed} entries from {source_name}"),
            }
        }

        Commands::Search {
            company,
            query,
            threshold,
            limit,
        } => {
            let components = create_components(&config).await?;

            match cli.format {
                OutputFormat::Json => {
                    let hits = components
                        .retrieval
                        .search_detailed(&query, &company, threshold, limit)
                        .await;
                    let output = SearchOutput {
                        query: query.clone(),
                        results: hits
                            .into_iter()
                            .map(|hit| ResultItem {
                                id: hit.entry.id,
                                source_type: hit.entry.source_type,
                                source_name: hit.entry.source_name,
                                similarity: hit.similarity,
                                content: hit.entry.content,
                            })
                            .collect(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    let context = components
                        .retrieval
                        .search(&query, &company, threshold, limit)
                        .await;
                    println!("{context}");
                }
            }
        }

        Commands::Prompt {
            company,
            message,
            history,
        } => {
            let components = create_components(&config).await?;
            let history: Vec<ConversationTurn> = history
                .into_iter()
                .map(|content| ConversationTurn::new("user", content))
                .collect();
            let prompt = components
                .retrieval
                .enrich_prompt(&message, &company, &history)
                .await;

            match cli.format {
                OutputFormat::Json => {
                    let output = serde_json::json!({ "prompt": prompt });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => println!("{prompt}"),
            }
        }

        Commands::Stats { company } => {
            let components = create_components(&config).await?;
            let stats = components
                .pipeline
                .stats(&company)
                .await
                .context("Failed to read statistics")?;
            print_stats(cli.format, &stats)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

fn print_entry(format: OutputFormat, verb: &str, entry: &KnowledgeEntry) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&EntryOutput::from(entry))?);
        }
        OutputFormat::Text => {
            println!("{verb} {} ({}: {})", entry.id, entry.source_type, entry.source_name);
            println!("   {}", truncate(&entry.content, 100));
        }
    }
    Ok(())
}

fn print_stats(format: OutputFormat, stats: &KnowledgeStats) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats)?);
        }
        OutputFormat::Text => {
            println!("Knowledge base for {}", stats.company_id);
            println!("  Entries: {}", stats.total_entries);
            println!("  Sources: {}", stats.unique_sources);
            for (source_type, count) in &stats.entries_by_source_type {
                println!("    {source_type}: {count}");
            }
            println!("  Ready:   {}", if stats.is_ready { "yes" } else { "no" });
            if let Some(last) = stats.last_updated {
                println!("  Updated: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

/// Truncate a string to max characters, adding ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
