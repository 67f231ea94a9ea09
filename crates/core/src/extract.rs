use crate::error::PipelineError;
use lopdf::Document;
use std::path::Path;

/// Pulls plain text out of a source file the caller already read.
/// Markdown and plain text pass through; PDFs go through lopdf page by page.
pub fn extract_text(path: &Path, bytes: &[u8]) -> Result<String, PipelineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => extract_pdf_text(path, bytes)?,
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    if text.trim().is_empty() {
        return Err(PipelineError::Extraction(format!(
            "no readable text in {}",
            path.display()
        )));
    }

    Ok(text)
}

fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String, PipelineError> {
    let document =
        Document::load_mem(bytes).map_err(|error| PipelineError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| PipelineError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    if pages.is_empty() {
        return Err(PipelineError::Extraction(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages.join("\n\n"))
}
