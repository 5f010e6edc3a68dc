//! # QA Agent CLI (`qa-agent`)
//!
//! ## Usage
//!
//! ```bash
//! qa-agent --config ./config/qa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qa-agent serve` | Start the HTTP API |
//! | `qa-agent ingest <paths..>` | Rebuild the knowledge base from files or directories |
//! | `qa-agent ask "<query>"` | Generate a test-case table |
//! | `qa-agent script "<test case>" --html <file>` | Generate a Selenium script |
//! | `qa-agent status` | Show the live knowledge base |
//! | `qa-agent clear` | Delete the knowledge base |
//!
//! API keys are read from the environment; a `.env` file in the working
//! directory is loaded first. Log verbosity follows `RUST_LOG` (default
//! `info`). Logs go to stderr, results to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qa_agent::agent::QaAgent;
use qa_agent::config::load_config_or_default;
use qa_agent::models::{Answer, UploadedFile};
use qa_agent::server::run_server;
use qa_agent::store::KnowledgeBase;

/// QA agent: turn product documents into grounded test cases and Selenium
/// scripts.
#[derive(Parser)]
#[command(name = "qa-agent", version)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is absent.
    #[arg(long, global = true, default_value = "./config/qa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Replace the knowledge base with the given files.
    ///
    /// Directories contribute their direct children. Unsupported or
    /// unreadable files are reported and skipped.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Generate a test-case table for a request.
    Ask {
        query: String,

        /// API key for this call, instead of the environment.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Generate a Selenium script for one test case.
    Script {
        test_case: String,

        /// HTML page the script drives.
        #[arg(long)]
        html: PathBuf,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show the live knowledge base.
    Status,

    /// Delete the knowledge base.
    Clear,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Expand directories one level and read every file.
fn read_inputs(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory: {}", path.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            for entry in entries {
                files.push(read_file(&entry)?);
            }
        } else {
            files.push(read_file(path)?);
        }
    }
    Ok(files)
}

fn read_file(path: &Path) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(name, bytes))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let cfg = load_config_or_default(&cli.config)?;

    // Status and clear only touch the store, so they work without
    // embedding or model credentials.
    match cli.command {
        Commands::Serve => return run_server(&cfg).await,
        Commands::Status => {
            let kb = KnowledgeBase::new(cfg.store.path.clone());
            match kb.status().await? {
                Some(status) => {
                    println!("knowledge base: {}", kb.root().display());
                    println!("  generation: {}", status.generation);
                    println!("  chunks: {}", status.chunk_count);
                    println!(
                        "  backend: {}/{} ({} dims, {})",
                        status.provider, status.model, status.dims, status.metric
                    );
                    println!("  built at: {}", status.built_at);
                }
                None => println!("No knowledge base at {}", kb.root().display()),
            }
            return Ok(());
        }
        Commands::Clear => {
            let kb = KnowledgeBase::new(cfg.store.path.clone());
            if kb.clear().await? {
                println!("Knowledge base cleared.");
            } else {
                println!("No knowledge base to clear.");
            }
            return Ok(());
        }
        _ => {}
    }

    let agent = QaAgent::from_config(cfg)?;

    match cli.command {
        Commands::Ingest { paths } => {
            let files = read_inputs(&paths)?;
            let report = agent.ingest(&files).await?;
            println!("{}", report.status_message);
            println!("  documents: {}", report.documents_processed);
            println!("  chunks: {}", report.chunks_written);
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.name, skipped.reason);
            }
        }
        Commands::Ask { query, api_key } => {
            let answer = agent.answer_query(&query, api_key.as_deref()).await?;
            if let Answer::KnowledgeBaseMissing = answer {
                eprintln!("{}", answer.text());
                std::process::exit(2);
            }
            println!("{}", answer.text());
        }
        Commands::Script {
            test_case,
            html,
            api_key,
        } => {
            let html = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read HTML file: {}", html.display()))?;
            let script = agent
                .synthesize_script(&test_case, &html, api_key.as_deref())
                .await?;
            println!("{}", script);
        }
        Commands::Serve | Commands::Status | Commands::Clear => {}
    }

    Ok(())
}
