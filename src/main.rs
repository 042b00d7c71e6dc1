//! dbot CLI application
//!
//! Command-line interface for the dbot-rs library.

use clap::{Parser, Subcommand};
use dbot_rs::utils::format_file_size;
use dbot_rs::{Config, DbotError, IndexKind, Indexer, SnapshotGenerator, SnapshotStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dbot")]
#[command(about = "Schema snapshots and semantic indexes for database question answering")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the database catalog and save its schema snapshot
    Snapshot {
        /// Database name the snapshot is stored under
        db: String,

        /// Connection string
        #[arg(long, env = "DATABASE_URL")]
        url: String,

        /// Include pg_*, public and information_schema
        #[arg(long)]
        keep_reserved: bool,
    },

    /// Print a stored schema snapshot
    Show {
        db: String,
    },

    /// Build the semantic index for a stored schema snapshot
    IndexSchema {
        db: String,
    },

    /// Build a semantic index for a document (pdf, txt, md, sql)
    IndexDoc {
        path: PathBuf,

        /// Index name; defaults to the file stem
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Search an index
    Search {
        /// Index name
        name: String,

        /// Search query
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long, default_value = "4")]
        top_k: usize,

        /// Search a document index instead of a schema index
        #[arg(long)]
        doc: bool,
    },

    /// Show whether a snapshot and index exist and belong together
    Status {
        name: String,

        #[arg(long)]
        doc: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    let outcome = match cli.command {
        Commands::Snapshot {
            db,
            url,
            keep_reserved,
        } => snapshot_command(config, db, url, keep_reserved).await,
        Commands::Show { db } => show_command(config, db),
        Commands::IndexSchema { db } => index_schema_command(config, db).await,
        Commands::IndexDoc { path, name } => index_doc_command(config, path, name).await,
        Commands::Search {
            name,
            query,
            top_k,
            doc,
        } => search_command(config, name, query, top_k, kind(doc)).await,
        Commands::Status { name, doc } => status_command(config, name, kind(doc)),
    };

    if let Err(err) = &outcome {
        if err.is_not_found() {
            eprintln!("❌ {}", err);
            eprintln!("   Run `dbot snapshot` / `dbot index-schema` (or `dbot index-doc`) first.");
            std::process::exit(2);
        }
    }
    outcome?;

    Ok(())
}

fn kind(doc: bool) -> IndexKind {
    if doc {
        IndexKind::Document
    } else {
        IndexKind::Schema
    }
}

/// `--keep-reserved` only ever widens what the configuration excludes
fn snapshot_generator(config: &Config, keep_reserved: bool) -> SnapshotGenerator {
    let generator = SnapshotGenerator::new(config);
    if keep_reserved {
        generator.with_exclusion(false)
    } else {
        generator
    }
}

async fn snapshot_command(
    config: Config,
    db: String,
    url: String,
    keep_reserved: bool,
) -> Result<(), DbotError> {
    println!("🗄️  Reading catalog for {}...", db);

    let path = snapshot_generator(&config, keep_reserved)
        .generate(&db, &url)
        .await?;
    let size = std::fs::metadata(&path)?.len();

    println!("✅ Snapshot saved: {} ({})", path.display(), format_file_size(size));
    Ok(())
}

fn show_command(config: Config, db: String) -> Result<(), DbotError> {
    let text = SnapshotStore::new(&config.storage.base_dir).load(&db)?;
    print!("{}", text);
    Ok(())
}

async fn index_schema_command(config: Config, db: String) -> Result<(), DbotError> {
    println!("🔧 Indexing schema snapshot for {}...", db);

    let indexer = Indexer::new(config)?.with_progress(true);
    let index = indexer.index_snapshot(&db).await?;
    let paths = indexer.store(IndexKind::Schema).paths(&db)?;

    println!("✅ Indexed {} chunks (dimension {})", index.len(), index.dimension());
    println!("   📋 Structure: {}", paths.structure.display());
    println!("   📋 Metadata: {}", paths.metadata.display());
    Ok(())
}

async fn index_doc_command(config: Config, path: PathBuf, name: Option<String>) -> Result<(), DbotError> {
    println!("📄 Processing: {}", path.display());

    let indexer = Indexer::new(config)?.with_progress(true);
    let index = indexer.index_document(&path, name.as_deref()).await?;

    println!("✅ Indexed {} as {} ({} chunks)", path.display(), index.name(), index.len());
    Ok(())
}

async fn search_command(
    config: Config,
    name: String,
    query: String,
    top_k: usize,
    kind: IndexKind,
) -> Result<(), DbotError> {
    println!("🔍 Searching for: \"{}\"", query);

    let indexer = Indexer::new(config)?;
    let mut retriever = indexer.retriever(kind, &name)?;
    let results = retriever.search(&query, top_k).await?;

    if results.is_empty() {
        println!("❌ No results found");
        return Ok(());
    }

    println!("📋 Found {} results:", results.len());
    println!();

    for (i, result) in results.iter().enumerate() {
        println!("{}. Distance: {:.3}", i + 1, result.distance);
        println!("   {}", result.chunk.text.trim());
        println!();
    }

    Ok(())
}

fn status_command(config: Config, name: String, kind: IndexKind) -> Result<(), DbotError> {
    if kind == IndexKind::Schema {
        let snapshots = SnapshotStore::new(&config.storage.base_dir);
        let mark = if snapshots.exists(&name) { "✅" } else { "❌" };
        println!("{} Snapshot: {}", mark, snapshots.path(&name)?.display());
    }

    let indexer = Indexer::new(config)?;
    if indexer.exists(kind, &name) {
        let index = indexer.load(kind, &name)?;
        let metadata = index.metadata();
        println!("✅ Index: {} chunks, build {}", index.len(), metadata.build_id);
        println!(
            "   Provider: {:?}/{} (dimension {})",
            metadata.provider.provider, metadata.provider.model, metadata.provider.dimension
        );
        println!("   Created: {}", metadata.created_at.to_rfc3339());
    } else {
        println!("❌ Index: missing or incomplete");
    }
    Ok(())
}
