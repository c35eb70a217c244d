use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tutorag::chunking::Chunker;
use tutorag::config::Config;
use tutorag::document::{DocumentFormat, LoaderRegistry};
use tutorag::embedding::{EmbeddingProvider, FastEmbedProvider, HashingEmbedder};
use tutorag::error::Result;
use tutorag::generate::OpenAiCompatibleClient;
use tutorag::rag::RagEngine;
use tutorag::store::VectorStore;

#[derive(Parser)]
#[command(name = "tutorag", about = "Retrieval-augmented tutoring backend", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document into the knowledge base
    Ingest {
        /// File to ingest (format inferred from the extension)
        file: PathBuf,
    },
    /// Ask a question, answered from the knowledge base with LLM fallback
    Ask {
        question: String,
    },
    /// Search the knowledge base directly
    Search {
        query: String,
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// Minimum similarity score
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Show knowledge-base statistics
    Stats,
    /// Replace the knowledge base with an empty generation
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;

    // Constructed once per process; every command shares this instance.
    let provider = build_provider(&config)?;
    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let store = Arc::new(VectorStore::open(
        provider,
        chunker,
        config.storage.data_dir.clone(),
    ));

    match cli.command {
        Commands::Ingest { file } => cmd_ingest(&store, &file)?,
        Commands::Ask { question } => {
            let generator = Arc::new(OpenAiCompatibleClient::new(&config.llm));
            let engine = RagEngine::new(
                store,
                generator,
                &config.context,
                config.retrieval.clone(),
            );
            cmd_ask(&engine, &question).await;
        }
        Commands::Search {
            query,
            k,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(config.retrieval.score_threshold);
            cmd_search(&store, &query, k, threshold);
        }
        Commands::Stats => cmd_stats(&store),
        Commands::Clear => {
            store.clear()?;
            println!("Knowledge base cleared.");
        }
    }

    Ok(())
}

fn cmd_ingest(store: &VectorStore, file: &PathBuf) -> Result<()> {
    let format = DocumentFormat::from_path(file)?;
    let registry = LoaderRegistry::new();
    let documents = registry.load(file, format)?;

    let outcome = store.ingest(&documents)?;
    println!(
        "Indexed {} chunks from {}{}",
        outcome.chunk_ids.len(),
        file.display(),
        if outcome.durable {
            ""
        } else {
            " (WARNING: not yet durable, save failed)"
        }
    );
    Ok(())
}

async fn cmd_ask(engine: &RagEngine, question: &str) {
    // Single-shot invocation: no prior transcript, so this always counts
    // as a first interaction.
    let answer = engine.answer(question, &[]).await;

    println!("{}\n", answer.answer);
    if answer.has_context {
        println!("Sources:");
        for doc in &answer.source_documents {
            println!("  [{:.3}] {} - {}", doc.score, doc.source, doc.preview);
        }
    } else {
        println!("(answered from general knowledge)");
    }
}

fn cmd_search(store: &VectorStore, query: &str, k: usize, threshold: f32) {
    let results = store.search(query, k, threshold);
    if results.is_empty() {
        println!("No relevant chunks found.");
        return;
    }
    for result in results {
        println!(
            "[{:.3}] {} ({})",
            result.score,
            result.chunk.chunk_id,
            result.chunk.source()
        );
        println!("  {}", head(&result.chunk.text, 160));
    }
}

fn cmd_stats(store: &VectorStore) {
    let stats = store.stats();
    println!("Total chunks:        {}", stats.total_chunks);
    println!("Embedding dimension: {}", stats.embedding_dimension);
    println!("Persist location:    {}", stats.persist_location.display());
    println!("Index generation:    {}", stats.generation);
}

fn build_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    if config.embedding.offline {
        Ok(Arc::new(HashingEmbedder::new(config.embedding.dimension)))
    } else {
        Ok(Arc::new(FastEmbedProvider::new(&config.embedding.model)?))
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutorag")
        .join("config.toml")
}

fn head(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
