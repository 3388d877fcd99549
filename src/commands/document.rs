use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::doc_processor::DocumentUpload;
use crate::error::ChatError;
use crate::state::AppState;

/// Multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub text: String,
}

fn invalid_upload(err: MultipartError) -> ChatError {
    ChatError::InvalidInput(format!("Invalid upload: {err}"))
}

/// `POST /api/parse-pdf`
pub async fn parse_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, ChatError> {
    let mut multipart = multipart.map_err(|e| {
        ChatError::InvalidInput(format!("Expected a multipart upload: {}", e.body_text()))
    })?;
    let upload = read_file_field(&mut multipart).await?;
    let text = state.extract(upload).await?;
    Ok(Json(ExtractResponse { text }))
}

/// First `file` field of the form, or `None` when the form has no such field.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<DocumentUpload>, ChatError> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid_upload)?;
        return Ok(Some(DocumentUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}
