//! HTTP API server binary: serves the upload/status/query surface and the
//! task-queue handler endpoint over axum.

use clap::Parser;
use loanpipe::api;
use loanpipe::blob::InMemoryBlobStore;
use loanpipe::config::Config;
use loanpipe::extraction::router::ExtractionRouter;
use loanpipe::llm::HttpLlmClient;
use loanpipe::ocr::{HeuristicScannedDetector, HttpOcrClient, OcrRouter};
use loanpipe::queue::InMemoryTaskQueue;
use loanpipe::repository::{InMemoryBorrowerRepository, InMemoryDocumentRepository};
use loanpipe::service::{Deps, DocumentService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// loanpipe HTTP API server.
#[derive(Parser)]
#[command(name = "loanpipe-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Run with an in-process task queue instead of synchronous processing.
    #[arg(long)]
    async_mode: bool,
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
    let deps = build_deps(config, cli.async_mode);
    let service = Arc::new(DocumentService::new(deps));

    let app = api::router(service);
    let listener = tokio::net::TcpListener::bind(&cli.addr).await?;
    info!(addr = %cli.addr, async_mode = cli.async_mode, "loanpipe-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_deps(config: Config, async_mode: bool) -> Arc<Deps> {
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

    Arc::new(Deps {
        blob: InMemoryBlobStore::new(config.blob_bucket.clone()),
        documents: InMemoryDocumentRepository::new(),
        borrowers: InMemoryBorrowerRepository::new(),
        queue: if async_mode { Some(InMemoryTaskQueue::new()) } else { None },
        extraction_router: Arc::new(ExtractionRouter::new()),
        ocr_router: Arc::new(ocr_router),
        llm,
        config,
    })
}
