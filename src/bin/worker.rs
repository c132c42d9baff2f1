//! Async-mode worker binary: polls the task queue and runs the pipeline for
//! each delivery, redelivering on a transient failure within the retry
//! budget.

use clap::Parser;
use loanpipe::blob::InMemoryBlobStore;
use loanpipe::config::Config;
use loanpipe::extraction::router::ExtractionRouter;
use loanpipe::llm::HttpLlmClient;
use loanpipe::ocr::{HeuristicScannedDetector, HttpOcrClient, OcrRouter};
use loanpipe::queue::InMemoryTaskQueue;
use loanpipe::repository::{InMemoryBorrowerRepository, InMemoryDocumentRepository};
use loanpipe::service::{Deps, DocumentService};
use loanpipe::task::run_worker;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// loanpipe document-processing worker.
#[derive(Parser)]
#[command(name = "loanpipe-worker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// How long to sleep between empty queue polls.
    #[arg(long, default_value = "1000")]
    idle_sleep_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let queue = InMemoryTaskQueue::new();

    let ocr_client = Arc::new(HttpOcrClient::new(
        config.ocr_service_url.clone(),
        config.ocr_service_token.clone(),
        config.ocr_timeout,
    ));
    let ocr_router = OcrRouter::new(
        ocr_client,
        config.breaker_failure_threshold,
        config.breaker_cooldown,
        Arc::new(HeuristicScannedDetector),
    );
    let llm = Arc::new(HttpLlmClient::new(config.llm_base_url.clone(), config.llm_api_key.clone(), config.llm_timeout));

    let deps = Arc::new(Deps {
        blob: InMemoryBlobStore::new(config.blob_bucket.clone()),
        documents: InMemoryDocumentRepository::new(),
        borrowers: InMemoryBorrowerRepository::new(),
        queue: Some(queue.clone()),
        extraction_router: Arc::new(ExtractionRouter::new()),
        ocr_router: Arc::new(ocr_router),
        llm,
        config,
    });
    let service = Arc::new(DocumentService::new(deps));

    info!("loanpipe-worker starting");
    run_worker(service, queue, Duration::from_millis(cli.idle_sleep_ms)).await;

    Ok(())
}
