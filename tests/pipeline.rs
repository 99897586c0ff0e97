//! End-to-end tests of the library: ingestion into a store, retrieval,
//! answering, and the HTTP router, all with in-process test doubles.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use localmind::answer::AnswerService;
use localmind::chunk::chunk_text;
use localmind::config::ChunkingConfig;
use localmind::embedding::{Embedder, HashEmbedder};
use localmind::error::{RagError, Result};
use localmind::ingest::Ingestor;
use localmind::llm::LlmBackend;
use localmind::models::{DocumentChunk, SourceRef};
use localmind::retrieval::Retriever;
use localmind::server::router;
use localmind::store::memory::InMemoryStore;
use localmind::store::sqlite::SqliteStore;
use localmind::store::VectorStore;

const REFERENCE_TEXT: &str = "Alpha beta. Gamma delta. Epsilon zeta.";
const REFERENCE_CHUNKS: [&str; 3] = ["Alpha beta. Gamma de", "ma delta. Epsilon ze", "on zeta."];

/// Embeds known texts to fixed vectors and fails on anything else.
struct LookupEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dims: usize,
}

impl LookupEmbedder {
    fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        let dims = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        Self {
            vectors: entries
                .iter()
                .map(|(t, v)| (t.to_string(), v.clone()))
                .collect(),
            dims,
        }
    }
}

#[async_trait]
impl Embedder for LookupEmbedder {
    fn model_name(&self) -> &str {
        "lookup"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| RagError::embedding("lookup", format!("unknown text {:?}", t)))
            })
            .collect()
    }
}

/// Replies with a fixed result and counts calls.
struct StubLlm {
    reply: std::result::Result<String, fn() -> RagError>,
    calls: AtomicUsize,
}

impl StubLlm {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: fn() -> RagError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmBackend for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }
}

fn reference_embedder(question: &str) -> Arc<LookupEmbedder> {
    Arc::new(LookupEmbedder::new(&[
        (REFERENCE_CHUNKS[0], vec![1.0, 0.0, 0.0]),
        (REFERENCE_CHUNKS[1], vec![0.0, 1.0, 0.0]),
        (REFERENCE_CHUNKS[2], vec![0.0, 0.0, 1.0]),
        (question, vec![0.9, 0.1, 0.0]),
    ]))
}

fn small_window() -> ChunkingConfig {
    ChunkingConfig {
        max_chars: 20,
        overlap: 5,
    }
}

#[test]
fn test_reference_chunking() {
    let chunks = chunk_text(REFERENCE_TEXT, 20, 5).unwrap();
    assert_eq!(chunks, REFERENCE_CHUNKS);
}

#[tokio::test]
async fn test_reference_question_cites_first_chunk() {
    let question = "What follows alpha?";
    let embedder = reference_embedder(question);
    let store = Arc::new(InMemoryStore::new());

    let written = Ingestor::new(embedder.clone(), store.clone(), small_window())
        .ingest_text("greek.txt", REFERENCE_TEXT)
        .await
        .unwrap();
    assert_eq!(written, 3);

    let llm = StubLlm::answering("Beta.");
    let service = AnswerService::new(Retriever::new(embedder, store), llm.clone(), 1, 50);
    let answer = service.answer(question, Some(1)).await.unwrap();

    assert_eq!(answer.text, "Beta.");
    assert_eq!(
        answer.sources,
        vec![SourceRef {
            doc_id: "greek.txt".to_string(),
            chunk_index: 0
        }]
    );
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_nearest_is_sorted_by_distance() {
    let question = "Where is delta?";
    let embedder = reference_embedder(question);
    let store = Arc::new(InMemoryStore::new());
    Ingestor::new(embedder.clone(), store.clone(), small_window())
        .ingest_text("greek.txt", REFERENCE_TEXT)
        .await
        .unwrap();

    let hits = Retriever::new(embedder, store)
        .retrieve(question, 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn test_sqlite_store_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let url = format!("sqlite:{}", tmp.path().join("localmind.sqlite").display());
    let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
    let embedder = Arc::new(HashEmbedder::new(64));
    store
        .register_model(embedder.model_name(), embedder.dims())
        .await
        .unwrap();

    let ingestor = Ingestor::new(embedder.clone(), store.clone(), ChunkingConfig::default());
    ingestor
        .ingest_text("leave.txt", "Annual leave requests are approved by your manager.")
        .await
        .unwrap();
    ingestor
        .ingest_text("parking.txt", "Visitor parking is on level two of the garage.")
        .await
        .unwrap();
    // Re-ingest does not duplicate
    ingestor
        .ingest_text("leave.txt", "Annual leave requests are approved by your manager.")
        .await
        .unwrap();

    let info = store.info().await.unwrap();
    assert_eq!(info.chunks, 2);
    assert_eq!(info.documents, 2);
    assert_eq!(info.model.as_deref(), Some("hash"));

    let llm = StubLlm::answering("Your manager.");
    let service = AnswerService::new(Retriever::new(embedder, store.clone()), llm, 1, 50);
    let answer = service
        .answer("Who approves annual leave requests?", None)
        .await
        .unwrap();
    assert_eq!(answer.sources[0].doc_id, "leave.txt");

    store.close().await;
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected() {
    let store = InMemoryStore::new();
    store
        .insert_batch(&[DocumentChunk {
            doc_id: "a".into(),
            chunk_index: 0,
            content: "a".into(),
            embedding: vec![0.0; 4],
        }])
        .await
        .unwrap();

    let err = store.nearest(&[0.0; 8], 1).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 4, actual: 8 }));
}

// ============ HTTP ============

async fn one_chunk_service(llm: Arc<StubLlm>) -> AnswerService {
    let embedder = Arc::new(HashEmbedder::new(32));
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_batch(&[DocumentChunk {
            doc_id: "only.txt".into(),
            chunk_index: 0,
            content: "The only chunk.".into(),
            embedding: embedder.embed_sync("The only chunk."),
        }])
        .await
        .unwrap();
    AnswerService::new(Retriever::new(embedder, store), llm, 5, 50)
}

async fn post_ask(service: AnswerService, body: &str) -> (StatusCode, serde_json::Value) {
    let response = router(service)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ask")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_ask_returns_available_sources() {
    let service = one_chunk_service(StubLlm::answering(" It is the only one. ")).await;
    let (status, json) = post_ask(service, r#"{"question":"x","top_k":2}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "It is the only one.");
    let sources = json["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["doc_id"], "only.txt");
    assert_eq!(sources[0]["chunk_index"], 0);
}

#[tokio::test]
async fn test_ask_empty_store_fallback() {
    let llm = StubLlm::answering("unused");
    let service = AnswerService::new(
        Retriever::new(Arc::new(HashEmbedder::new(8)), Arc::new(InMemoryStore::new())),
        llm.clone(),
        5,
        50,
    );
    let (status, json) = post_ask(service, r#"{"question":"anything"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "I couldn't find any relevant documents.");
    assert_eq!(json["sources"].as_array().unwrap().len(), 0);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ask_validation_errors() {
    let service = one_chunk_service(StubLlm::answering("x")).await;

    let (status, json) = post_ask(service.clone(), r#"{"question":"   "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let (status, _) = post_ask(service.clone(), r#"{"question":"x","top_k":0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post_ask(service, "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_ask_backend_failures() {
    let service = one_chunk_service(StubLlm::failing(|| RagError::Backend {
        status: 404,
        body: "model not found".into(),
    }))
    .await;
    let (status, json) = post_ask(service, r#"{"question":"x"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "backend_error");

    let service =
        one_chunk_service(StubLlm::failing(|| RagError::Timeout("LLM generation".into()))).await;
    let (status, json) = post_ask(service, r#"{"question":"x"}"#).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"]["code"], "timeout");
}

#[tokio::test]
async fn test_health() {
    let service = one_chunk_service(StubLlm::answering("x")).await;
    let response = router(service)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}
