//! API routes for the RAG server

pub mod admin;
pub mod ask;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ask", post(ask::ask))
        // Uploads get a larger body limit than the JSON endpoints
        .route(
            "/upload",
            post(admin::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/reingest", post(admin::reingest))
        .route("/info", get(info))
}

/// GET / - liveness message
async fn root() -> Json<Value> {
    Json(json!({ "message": "Backend running" }))
}

/// GET /info - service and index description
async fn info(State(state): State<AppState>) -> Result<Json<Value>> {
    let config = state.config();
    let chunks = state.vector_store().len().await?;
    let last_ingest = state.last_ingest().map(|report| {
        json!({
            "documents": report.documents.len(),
            "chunks": report.total_chunks_created,
            "errors": report.errors.len(),
            "processing_time_ms": report.processing_time_ms,
        })
    });

    Ok(Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "vector_store": {
            "backend": state.vector_store().name(),
            "metric": config.vector_db.metric,
            "chunks": chunks,
        },
        "embeddings": {
            "provider": state.embedding_provider().name(),
            "model": config.embeddings.model,
            "dimensions": state.embedding_provider().dimensions(),
        },
        "llm": {
            "provider": state.llm_provider().name(),
            "model": state.llm_provider().model(),
        },
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "max_top_k": config.retrieval.max_top_k,
        },
        "ingesting": state.is_ingesting(),
        "last_ingest": last_ingest,
        "endpoints": {
            "POST /ask": "Answer a question with sources",
            "POST /upload": "Upload PDF files (multipart field 'files')",
            "POST /reingest": "Rebuild the index from the data directory",
            "GET /info": "This document",
        },
    })))
}
