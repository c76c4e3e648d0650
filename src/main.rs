//! Word Embedding - command line lookup
//!
//! Loads a candle word model and prints one JSON object per word.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use word_embedding::embeddings::{CandleWordModel, EmbeddingService};
use word_embedding::Config;

#[derive(Parser)]
#[command(name = "wordembed")]
#[command(about = "Look up word embeddings from a trained model")]
struct Cli {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model directory (overrides config.yaml and WORD_EMBEDDING_MODEL_DIR)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether words are part of the model vocabulary
    Contains {
        /// Words to check
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Print the embedding of each word (unknown words use the unknown token)
    Embed {
        /// Words to embed
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[derive(Serialize)]
struct WordReport<'a> {
    word: &'a str,
    known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,word_embedding=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    let model = CandleWordModel::load(&config.model_dir)
        .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?;
    let mut service = EmbeddingService::new(Box::new(model))?;

    let result = run(&service, cli.command).await;
    service.close();
    result
}

async fn run(service: &EmbeddingService, command: Commands) -> Result<()> {
    match command {
        Commands::Contains { words } => {
            for word in &words {
                let report = WordReport {
                    word,
                    known: service.is_known(word)?,
                    vector: None,
                };
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Commands::Embed { words } => {
            for word in &words {
                let report = WordReport {
                    word,
                    known: service.is_known(word)?,
                    vector: Some(service.embed_word(word).await?),
                };
                println!("{}", serde_json::to_string(&report)?);
            }
        }
    }
    Ok(())
}
