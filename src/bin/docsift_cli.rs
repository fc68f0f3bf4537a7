use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docsift::{
    config,
    processing::{ProcessingApi, ProcessingService, Upload},
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "docsift-cli",
    about = "Ingest documents and query the docsift index from the command line"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed, and index one or more PDFs or images.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the chunks most similar to the query text.
    Query {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Cluster chunks related to the query and summarize each cluster.
    Themes {
        text: String,
        #[arg(long)]
        clusters: Option<usize>,
    },
    /// List indexed documents.
    Documents,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("Failed to load config from environment")?;
    let service = ProcessingService::from_config(&config)
        .context("Failed to initialize processing service")?;

    match cli.command {
        Command::Ingest { paths } => {
            let mut uploads = Vec::with_capacity(paths.len());
            for path in &paths {
                uploads.push(read_upload(path).await?);
            }
            let entries = service.ingest_batch(uploads).await;
            let failed = entries.iter().filter(|entry| entry.error().is_some()).count();
            print_json(&entries)?;
            if failed > 0 {
                bail!("{failed} of {} files failed", entries.len());
            }
        }
        Command::Query { text, top_k } => {
            print_json(&service.query(&text, top_k).await?)?;
        }
        Command::Themes { text, clusters } => {
            print_json(&service.themes(&text, clusters).await?)?;
        }
        Command::Documents => {
            print_json(&service.list_documents().await?)?;
        }
    }
    Ok(())
}

async fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(Upload::new(filename, bytes))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{rendered}");
    Ok(())
}
