use filing_digest::chunking::HeuristicSubheadingDetector;
use filing_digest::embedding::get_embedding_client;
use filing_digest::filing::InMemoryFilingStore;
use filing_digest::indexer::EmbeddingIndexer;
use filing_digest::llm::OllamaCompletionClient;
use filing_digest::metrics::PipelineMetrics;
use filing_digest::pipeline::FilingPipeline;
use filing_digest::qa::AnswerService;
use filing_digest::qdrant::QdrantService;
use filing_digest::source::HttpFilingSource;
use filing_digest::storage::{FsTextStore, InMemoryTextStore, TextStore};
use filing_digest::summarize::SummaryOrchestrator;
use filing_digest::{api, config, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let qdrant = QdrantService::new().expect("Failed to initialize Qdrant client");
    qdrant
        .create_collection_if_not_exists(
            &config.qdrant_collection_name,
            config.embedding_dimension as u64,
        )
        .await
        .expect("Failed to ensure Qdrant collection");
    qdrant
        .ensure_payload_indexes(&config.qdrant_collection_name)
        .await
        .expect("Failed to ensure Qdrant payload indexes");
    let index = Arc::new(qdrant);

    let texts: Arc<dyn TextStore> = match &config.storage_dir {
        Some(dir) => Arc::new(FsTextStore::new(dir)),
        None => Arc::new(InMemoryTextStore::new()),
    };

    let completion = Arc::new(OllamaCompletionClient::new(config.ollama_base_url()));
    let embedder: Arc<dyn filing_digest::embedding::EmbeddingClient> =
        Arc::from(get_embedding_client());
    let metrics = Arc::new(PipelineMetrics::new());

    let summarizer = SummaryOrchestrator::new(
        completion.clone(),
        config.completion_model.clone(),
        config.map_concurrency,
        config.section_concurrency,
        config.summary_sections.clone(),
    );
    let indexer = EmbeddingIndexer::new(
        embedder.clone(),
        index.clone(),
        texts.clone(),
        config.embed_batch_size,
    );
    let qa = AnswerService::new(
        embedder,
        index,
        texts.clone(),
        completion,
        config.completion_model.clone(),
        config.qa_top_k,
    );

    let pipeline = FilingPipeline::new(
        Arc::new(HttpFilingSource::new(config.filing_source_url.clone())),
        Arc::new(InMemoryFilingStore::new()),
        texts,
        summarizer,
        indexer,
        qa,
        Box::new(HeuristicSubheadingDetector),
        config.summary_profile(),
        config.embedding_profile(),
        metrics,
    );

    let app = api::create_router(Arc::new(pipeline));

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 7400..=7499;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 7400-7499",
    ))
}
