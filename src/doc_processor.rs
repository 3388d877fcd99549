use tracing::debug;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file as received from the upload form.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: Some(PDF_MEDIA_TYPE.to_string()),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("PDF parse error: {0}")]
    Parse(String),
}

fn no_file() -> ExtractError {
    ExtractError::InvalidInput("No file uploaded".into())
}

/// Compares the MIME essence only, so `application/pdf; name=x` still counts.
pub fn is_pdf_media_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Reject anything that is not a non-empty PDF upload.
pub fn validate_upload(upload: Option<&DocumentUpload>) -> Result<&DocumentUpload, ExtractError> {
    let upload = upload.filter(|u| !u.bytes.is_empty()).ok_or_else(no_file)?;
    if !is_pdf_media_type(upload.content_type.as_deref()) {
        return Err(ExtractError::InvalidInput(
            "Invalid file type. Please upload a PDF.".into(),
        ));
    }
    Ok(upload)
}

/// Plain text of every page, concatenated.
pub fn parse_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Parse(e.to_string()))
}

pub fn extract_text(upload: Option<&DocumentUpload>) -> Result<String, ExtractError> {
    extract_text_with(upload, parse_pdf)
}

/// Validate first, then hand the bytes to `parse`. The parser never sees a
/// rejected upload.
pub fn extract_text_with<F>(upload: Option<&DocumentUpload>, parse: F) -> Result<String, ExtractError>
where
    F: FnOnce(&[u8]) -> Result<String, ExtractError>,
{
    let upload = validate_upload(upload)?;
    let text = parse(&upload.bytes)?;
    debug!(
        file = upload.file_name.as_deref().unwrap_or("unnamed"),
        bytes = upload.bytes.len(),
        chars = text.len(),
        "extracted PDF text"
    );
    Ok(text)
}

/// Same as [`extract_text`], run on the blocking pool. A parser panic is
/// reported as a parse failure instead of taking the worker down.
pub async fn extract_text_blocking(upload: Option<DocumentUpload>) -> Result<String, ExtractError> {
    let upload = upload.ok_or_else(no_file)?;
    validate_upload(Some(&upload))?;
    tokio::task::spawn_blocking(move || extract_text(Some(&upload)))
        .await
        .map_err(|e| ExtractError::Parse(format!("PDF parser aborted: {e}")))?
}
