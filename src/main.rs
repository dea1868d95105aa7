//! Paper Tree Indexer CLI
//!
//! Builds page-anchored semantic tree indexes for the papers in a registry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paper_tree_indexer::{
    budget::TextBudgeter,
    config::Config,
    document::{Document, PageExtractor},
    indexer::{IndexOutcome, IndexStore},
    llm::LlmClient,
    persistence::{list_records, load_record, record_path, record_size},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Paper Tree Indexer - page-anchored semantic trees for academic PDFs
#[derive(Parser)]
#[command(name = "paper-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding metadata.json, PDFs and index files
    #[arg(long, global = true)]
    papers_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build indexes for every paper in the registry
    Build,

    /// Build the index for one registered paper
    Index {
        /// Paper id from metadata.json
        paper_id: String,
    },

    /// Register a PDF and build its index
    Upload {
        /// Path to the PDF file
        pdf: PathBuf,
    },

    /// Show extracted pages and budgeted text stats (no LLM call)
    Extract {
        /// Path to the PDF file
        pdf: PathBuf,

        /// Print the budgeted text itself
        #[arg(long)]
        print: bool,
    },

    /// Display the tree of a built index
    Show {
        /// Paper id
        paper_id: String,

        /// Output as JSON instead of formatted tree
        #[arg(long)]
        json: bool,
    },

    /// List papers that have an index
    List,

    /// Test LLM connection
    Test,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.papers_dir {
        config.index.papers_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Build => cmd_build(config).await,
        Commands::Index { paper_id } => cmd_index(config, paper_id).await,
        Commands::Upload { pdf } => cmd_upload(config, pdf).await,
        Commands::Extract { pdf, print } => cmd_extract(config, pdf, print),
        Commands::Show { paper_id, json } => cmd_show(config, paper_id, json),
        Commands::List => cmd_list(config),
        Commands::Test => cmd_test(config).await,
    }
}

async fn cmd_build(config: Config) -> Result<()> {
    config
        .validate_llm()
        .context("LLM configuration required for indexing")?;
    let store = IndexStore::from_config(&config)?;

    println!("Building indexes from: {}", store.registry().path().display());
    println!("Using model: {}", config.llm.model);

    let start = Instant::now();
    let report = store.build_all().await.context("Batch aborted")?;

    println!("\nBatch finished in {:.2?}", start.elapsed());
    println!("  Built:    {}", report.built.len());
    println!("  Skipped:  {}", report.skipped.len());
    println!("  Failed:   {}", report.failed.len());

    for (id, reason) in &report.skipped {
        println!("  [skip]  {}: {}", id, reason);
    }
    for failure in &report.failed {
        println!("  [error] {}", failure);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} of {} papers failed", report.failed.len(), report.total());
    }
    Ok(())
}

async fn cmd_index(config: Config, paper_id: String) -> Result<()> {
    config
        .validate_llm()
        .context("LLM configuration required for indexing")?;
    let store = IndexStore::from_config(&config)?;

    println!("Indexing paper: {}", paper_id);
    let start = Instant::now();

    let outcome = store
        .build_by_id(&paper_id)
        .await
        .with_context(|| format!("Failed to build index for '{}'", paper_id))?;

    print_outcome(&config, &outcome, start)
}

async fn cmd_upload(config: Config, pdf: PathBuf) -> Result<()> {
    if !pdf
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
    {
        anyhow::bail!("Only PDF files are supported: {}", pdf.display());
    }

    let filename = pdf
        .file_name()
        .and_then(|n| n.to_str())
        .context("PDF path has no usable file name")?
        .to_string();
    let bytes = std::fs::read(&pdf).with_context(|| format!("Failed to read {}", pdf.display()))?;

    let store = IndexStore::from_config(&config)?;
    let start = Instant::now();
    let upload = store
        .submit_and_build(&filename, &bytes)
        .await
        .context("Failed to register upload")?;

    let verb = if upload.submission.reused { "Updated" } else { "Registered" };
    println!("{} paper: {}", verb, upload.submission.entry.id);
    println!("  PDF saved to: {}", upload.submission.pdf_path.display());

    match upload.outcome {
        Ok(outcome) => print_outcome(&config, &outcome, start),
        Err(failure) => anyhow::bail!("{}", failure),
    }
}

fn print_outcome(config: &Config, outcome: &IndexOutcome, start: Instant) -> Result<()> {
    match outcome {
        IndexOutcome::Built(record) => {
            let path = record_path(&config.index.papers_dir, &record.paper_id);
            println!("\nIndex Built:");
            println!("  Nodes:       {}", record.tree.node_count());
            println!("  Max depth:   {}", record.tree.max_depth());
            println!("  Leaves:      {}", record.tree.leaves().len());
            println!("  Build time:  {:.2?}", start.elapsed());
            println!("\nIndex saved to: {}", path.display());
            let size = record_size(&path)?;
            println!("  File size: {:.1} KB", size as f64 / 1024.0);
        }
        IndexOutcome::Skipped(reason) => {
            println!("Skipped: {}", reason);
        }
    }
    Ok(())
}

fn cmd_extract(config: Config, pdf: PathBuf, print: bool) -> Result<()> {
    let extractor = PageExtractor::new(config.index.max_pages);
    let document = Document::from_pdf(&pdf, &extractor).context("Failed to extract PDF text")?;

    println!("Document: {}", pdf.display());
    println!(
        "  Pages:       {} (of {} in file)",
        document.page_count(),
        document.total_pages
    );
    println!("  Characters:  {}", document.char_count());

    if document.is_empty() {
        println!("  No extractable text (scanned PDF?)");
        return Ok(());
    }

    let text = TextBudgeter::new(config.index.max_text_chars).assemble(&document.pages);
    println!(
        "  Budgeted:    {} chars, {} pages{}",
        text.char_len(),
        text.pages_included(),
        text.truncated_at()
            .map(|p| format!(", truncated at page {}", p))
            .unwrap_or_default()
    );

    if print {
        println!("{}", "─".repeat(60));
        print!("{}", text);
    }
    Ok(())
}

fn cmd_show(config: Config, paper_id: String, json: bool) -> Result<()> {
    let record = load_record(&config.index.papers_dir, &paper_id)
        .with_context(|| format!("No index for '{}'. Run 'index' first.", paper_id))?;

    if json {
        println!("{}", record.to_json().context("Failed to serialize record")?);
    } else {
        println!("{}", record.format());
    }
    Ok(())
}

fn cmd_list(config: Config) -> Result<()> {
    let ids = list_records(&config.index.papers_dir)?;
    if ids.is_empty() {
        println!("No indexes in {}", config.index.papers_dir.display());
        return Ok(());
    }

    println!("{:<40} {:>6} {:>8}  {}", "PAPER", "NODES", "KB", "BUILT");
    println!("{}", "─".repeat(78));
    for id in ids {
        let path = record_path(&config.index.papers_dir, &id);
        match load_record(&config.index.papers_dir, &id) {
            Ok(record) => println!(
                "{:<40} {:>6} {:>8.1}  {}",
                id,
                record.tree.node_count(),
                record_size(&path).unwrap_or(0) as f64 / 1024.0,
                record.built_at.format("%Y-%m-%d %H:%M")
            ),
            Err(e) => println!("{:<40} unreadable: {}", id, e),
        }
    }
    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    println!(
        "  API Key:   {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => {
            println!("Connection successful!");
        }
        Err(e) => {
            println!("Connection failed: {}", e);
        }
    }

    Ok(())
}
