//! FinSight CLI
//!
//! Interactive financial Q&A over indexed 10-K filings:
//! - Loads layered configuration and validates it (fatal on error)
//! - Wires the Qdrant-backed search client and the LLM generation client
//! - Plans an answer context per question and hands it to generation

use finsight_common::embeddings::create_embedder;
use finsight_common::generation::{Generator, MockGenerator, OpenAiGenerator};
use finsight_common::search::QdrantSearch;
use finsight_common::{metrics, AppConfig, VERSION};
use finsight_engine::QueryEngine;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting FinSight v{}", VERSION);

    // Invalid settings are fatal here, never inside the query path
    config.validate().map_err(|e| {
        tracing::error!(error = %e, "Configuration rejected");
        e
    })?;

    metrics::register_metrics();

    // Wire the collaborators
    let embedder = create_embedder(&config.embedding)?;
    info!(model = embedder.model_name(), "Embedder ready");

    let search = Arc::new(QdrantSearch::new(
        config.vector.url.clone(),
        config.vector.collection.clone(),
        config.vector.api_key.clone(),
        embedder,
        config.search_timeout(),
    )?);
    info!(url = %config.vector.url, collection = %config.vector.collection, "Vector store client ready");

    let generator: Arc<dyn Generator> = match &config.llm.api_key {
        Some(_) => Arc::new(OpenAiGenerator::from_config(&config.llm)?),
        None => {
            warn!("llm.api_key not set, answers will be mocked");
            Arc::new(MockGenerator)
        }
    };

    let engine = QueryEngine::new(&config, search);

    println!("FinSight ready. Ask a question about GOOGL, MSFT, or NVDA 10-K filings.");
    println!("Type 'quit' to exit.");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("\n> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();

        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match engine.answer_query_plan(query).await {
            Ok(context) => {
                info!(
                    classification = context.classification.as_str(),
                    excerpts = context.excerpts.len(),
                    calculations = context.calculations.len(),
                    "Answer context planned"
                );
                match generator.generate(&context.render(), query).await {
                    Ok(answer) => println!("\n{}", answer),
                    Err(e) => {
                        warn!(error = %e, "Generation failed");
                        println!("\nCould not generate an answer: {}", e);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Query rejected");
                println!("\n{}", e);
            }
        }
    }

    info!("FinSight shutting down");
    Ok(())
}
