//! Question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::types::{AskRequest, AskResponse};

/// POST /ask - answer a question from the indexed documents
///
/// Each source carries the file name and the page the chunk came from.
/// Pages are counted from 1, so the first page of a PDF is page 1.
pub async fn ask(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    let question = request.validated_question()?;
    let retrieval = &state.config().retrieval;
    let top_k = request.effective_top_k(retrieval.top_k, retrieval.max_top_k);

    tracing::info!("Question (top_k={}): \"{}\"", top_k, question);

    let results = state.retriever().retrieve(question, top_k).await?;
    if results.is_empty() {
        tracing::info!("No relevant chunks found");
        return Ok(Json(AskResponse::not_found(
            state.config().prompt.no_context_answer.clone(),
        )));
    }

    let context = PromptBuilder::build_context(&results);
    let prompt = state.prompt().build(question, &context);
    let answer = state.llm_provider().generate(&prompt).await?;

    let response = AskResponse::new(answer, &results);
    tracing::info!(
        "Answered in {}ms from {} chunks",
        start.elapsed().as_millis(),
        response.sources.len()
    );
    Ok(Json(response))
}
