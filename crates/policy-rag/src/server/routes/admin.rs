//! Document administration: upload PDFs and rebuild the index

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::{IngestError, UploadResponse};
use crate::types::IngestReport;

/// Multipart field carrying uploaded files
const FILES_FIELD: &str = "files";

/// Reduce a client-supplied name to a plain `.pdf` basename
///
/// Directory components are dropped; hidden names and names without a
/// `.pdf` extension are rejected.
pub fn sanitize_pdf_name(raw: &str) -> std::result::Result<String, String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err("missing file name".to_string());
    }
    if name.starts_with('.') {
        return Err("hidden file names are not allowed".to_string());
    }
    if name.chars().any(|c| c.is_control()) {
        return Err("file name contains control characters".to_string());
    }
    if !name.to_lowercase().ends_with(".pdf") {
        return Err("only .pdf files are accepted".to_string());
    }
    Ok(name.to_string())
}

/// POST /upload - save PDFs into the data directory
///
/// Files are stored but not indexed; call `/reingest` afterwards.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let data_dir = state.config().data.data_dir.clone();
    tokio::fs::create_dir_all(&data_dir).await?;

    let mut saved = Vec::new();
    let mut rejected = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            tracing::debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let raw_name = field.file_name().unwrap_or("").to_string();
        let filename = match sanitize_pdf_name(&raw_name) {
            Ok(name) => name,
            Err(reason) => {
                rejected.push(IngestError {
                    filename: raw_name,
                    error: reason,
                });
                continue;
            }
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read '{}': {}", filename, e)))?;

        if !data.starts_with(b"%PDF") {
            rejected.push(IngestError {
                filename,
                error: "file content is not a PDF".to_string(),
            });
            continue;
        }

        tokio::fs::write(data_dir.join(&filename), &data).await?;
        tracing::info!("Saved upload '{}' ({} bytes)", filename, data.len());
        saved.push(filename);
    }

    Ok(Json(UploadResponse {
        success: !saved.is_empty() && rejected.is_empty(),
        saved,
        rejected,
    }))
}

/// POST /reingest - rebuild the index from the data directory
pub async fn reingest(State(state): State<AppState>) -> Result<Json<IngestReport>> {
    tracing::info!("Re-ingest requested");
    Ok(Json(state.reingest().await?))
}
