use std::path::Path;

use common::error::AppError;
use lopdf::Document;
use tracing::{debug, warn};

const PAGE_SEPARATOR: &str = "\n";

/// Extracts the text layer page by page and joins the pages with a newline.
/// Parsing stays off the async executor. When the per-page pass yields only
/// whitespace, a whole-document pass runs before giving up.
pub async fn extract_pdf_text(file_path: &Path) -> Result<String, AppError> {
    let pdf_bytes = tokio::fs::read(file_path).await?;

    tokio::task::spawn_blocking(move || extract_blocking(&pdf_bytes)).await?
}

fn extract_blocking(pdf_bytes: &[u8]) -> Result<String, AppError> {
    let document = Document::load_mem(pdf_bytes)
        .map_err(|err| AppError::Processing(format!("Failed to parse PDF: {err}")))?;

    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page in page_numbers {
        match document.extract_text(&[page]) {
            Ok(text) => pages.push(text.trim().to_string()),
            Err(err) => {
                warn!(page, error = %err, "failed to extract text layer for page");
                pages.push(String::new());
            }
        }
    }

    let joined = pages.join(PAGE_SEPARATOR);
    if !joined.trim().is_empty() {
        debug!(pages = pages.len(), chars = joined.len(), "extracted PDF text layer");
        return Ok(joined);
    }

    // Some documents defeat the per-page pass even though a text layer exists.
    let fallback = pdf_extract::extract_text_from_mem(pdf_bytes)
        .map_err(|err| AppError::Processing(format!("Failed to extract text from PDF: {err}")))?;
    Ok(fallback.trim().to_string())
}
