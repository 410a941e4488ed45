//! HTTP server for the RAG system

pub mod extract;
pub mod routes;
pub mod state;

use axum::{http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{RagConfig, ServerConfig};
use crate::error::{Error, Result};
use state::AppState;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(server.max_upload_size))
        .with_state(state)
        // Middleware layers (order matters - applied bottom to top)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Shared state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Log provider reachability; failures do not stop startup
    pub async fn check_providers(&self) {
        let checks = [
            ("embedding", self.state.embedding_provider().health_check().await),
            ("llm", self.state.llm_provider().health_check().await),
            ("vector store", self.state.vector_store().health_check().await),
        ];
        for (what, result) in checks {
            match result {
                Ok(true) => tracing::info!("{} provider is reachable", what),
                Ok(false) => tracing::warn!("{} provider is not responding", what),
                Err(e) => tracing::warn!("{} provider health check failed: {}", what, e),
            }
        }
    }

    /// Start the server and run until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state.clone(), &self.config.server);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;
        tracing::info!("Starting RAG server on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockEmbedder, MockLlm, MockVectorStore};
    use crate::types::{Chunk, ChunkSource};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const DIMS: usize = 64;

    struct Harness {
        state: AppState,
        llm: Arc<MockLlm>,
        _data: tempfile::TempDir,
    }

    fn harness(texts: &[(&str, u32)], llm: MockLlm) -> Harness {
        let data = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.data.data_dir = data.path().to_path_buf();

        let embedder = Arc::new(MockEmbedder::new(DIMS));
        let store = if texts.is_empty() {
            MockVectorStore::new(DIMS)
        } else {
            MockVectorStore::with_chunks(
                texts
                    .iter()
                    .enumerate()
                    .map(|(i, (text, page))| {
                        let mut chunk = Chunk::new(
                            Uuid::new_v4(),
                            text.to_string(),
                            ChunkSource::pdf("handbook.pdf", *page, 10),
                            i as u32,
                        );
                        chunk.embedding = embedder.vector_for(text);
                        chunk
                    })
                    .collect(),
            )
        };
        let llm = Arc::new(llm);
        let state = AppState::from_parts(config, embedder, llm.clone(), Arc::new(store));
        Harness {
            state,
            llm,
            _data: data,
        }
    }

    fn router(h: &Harness) -> Router {
        build_router(h.state.clone(), &h.state.config().server)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let h = harness(&[], MockLlm::answering("unused"));

        let response = router(&h)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Backend running");

        let response = router(&h)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        h.state.set_ready(false);
        let response = router(&h)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ask_returns_answer_and_sources() {
        let h = harness(
            &[("school starts at nine", 2), ("lunch costs two pounds", 5)],
            MockLlm::answering("  School starts at 9am.  "),
        );

        let response = router(&h)
            .oneshot(post_json("/ask", r#"{"question":"lunch costs two pounds","top_k":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["answer"], "School starts at 9am.");
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["source"], "handbook.pdf");
        assert_eq!(sources[0]["page"], 5);

        let prompts = h.llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("CONTEXT:\nlunch costs two pounds\n\nQUESTION:"));
    }

    #[tokio::test]
    async fn test_blank_question_is_bad_request() {
        let h = harness(&[("anything", 1)], MockLlm::answering("unused"));

        let response = router(&h)
            .oneshot(post_json("/ask", r#"{"question":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["type"], "invalid_request");
        assert!(h.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_ask_body_uses_error_format() {
        let h = harness(&[("anything", 1)], MockLlm::answering("unused"));

        for body in [r#"{"top_k":2}"#, r#"{"question":"#] {
            let response = router(&h).oneshot(post_json("/ask", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"]["type"], "invalid_request");
        }
        assert!(h.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_reingest_while_running_is_conflict() {
        let h = harness(&[], MockLlm::answering("unused"));
        let _running = h.state.lock_ingest().await;

        let response = router(&h)
            .oneshot(Request::post("/reingest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"]["type"], "busy");
    }

    #[tokio::test]
    async fn test_empty_index_skips_model() {
        let h = harness(&[], MockLlm::answering("unused"));

        let response = router(&h)
            .oneshot(post_json("/ask", r#"{"question":"When is sports day?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["answer"], h.state.config().prompt.no_context_answer.as_str());
        assert!(body["sources"].as_array().unwrap().is_empty());
        assert!(h.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_service_unavailable() {
        let h = harness(&[("term dates", 1)], MockLlm::failing());

        let response = router(&h)
            .oneshot(post_json("/ask", r#"{"question":"term dates"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upload_saves_pdfs_and_rejects_others() {
        let h = harness(&[], MockLlm::answering("unused"));
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"../policy.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n%PDF-1.4 test\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n\
             --{b}--\r\n",
            b = boundary
        );

        let request = Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let response = router(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["saved"], serde_json::json!(["policy.pdf"]));
        assert_eq!(body["rejected"][0]["filename"], "notes.txt");
        assert_eq!(body["success"], false);
        assert!(h.state.config().data.data_dir.join("policy.pdf").exists());
    }

    #[tokio::test]
    async fn test_reingest_without_pdfs_is_bad_request() {
        let h = harness(&[], MockLlm::answering("unused"));

        let response = router(&h)
            .oneshot(Request::post("/reingest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_info_reports_chunk_count() {
        let h = harness(&[("one", 1), ("two", 1)], MockLlm::answering("unused"));
        assert_eq!(h.state.vector_store().len().await.unwrap(), 2);

        let response = router(&h)
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["vector_store"]["chunks"], 2);
        assert_eq!(body["llm"]["model"], "mock-model");
        assert_eq!(body["ingesting"], false);
    }
}
