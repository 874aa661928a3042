//! Deterministic handling of paginated documents.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, StatementError};
use crate::renderer;

/// Reads page-oriented documents without calling any external service.
///
/// Abstracted so the pipeline can be exercised without real PDFs.
pub trait DocumentReader: Send + Sync {
    /// Text of every page, concatenated in page order.
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String>;

    /// PNG of the first page only, at `scale` × 72 DPI.
    fn render_first_page(&self, pdf_bytes: &[u8], scale: f32) -> Result<Vec<u8>>;
}

/// PDF reader backed by `pdf-extract` for text and `lopdf` for page images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfDocumentReader;

impl DocumentReader for PdfDocumentReader {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String> {
        // pdf-extract panics on some documents lopdf accepts, e.g. an undeclared font.
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }))
        .map_err(|payload| {
            StatementError::PdfParsing(format!(
                "text extraction panicked: {}",
                panic_message(payload.as_ref())
            ))
        })?
        .map_err(|e| StatementError::PdfParsing(e.to_string()))?;

        let mut all_text = String::new();
        for page in pages {
            all_text.push_str(&page);
            all_text.push('\n');
        }
        Ok(all_text)
    }

    fn render_first_page(&self, pdf_bytes: &[u8], scale: f32) -> Result<Vec<u8>> {
        renderer::render_first_page(pdf_bytes, scale)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// What a document handed to the extraction service looks like.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentContent {
    /// Text-native document; the full extracted text.
    Text(String),
    /// Sparse or no text; PNG of the first page.
    PageImage(Vec<u8>),
}

/// Decide between the text and the image representation of a document.
///
/// Text wins when it is longer than `min_document_text_len` characters once
/// trimmed. Otherwise only the first page is rasterized. A failed text pass
/// counts as no text; a failed render is returned as an error.
pub fn read_document(
    reader: &dyn DocumentReader,
    pdf_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<DocumentContent> {
    let text = reader.extract_text(pdf_bytes).unwrap_or_else(|e| {
        warn!("Document text extraction failed, trying first-page render: {}", e);
        String::new()
    });

    let text_len = text.trim().chars().count();
    debug!(
        "Extracted {} characters of document text (threshold {})",
        text_len, config.min_document_text_len
    );

    if text_len > config.min_document_text_len {
        return Ok(DocumentContent::Text(text));
    }

    let png = reader.render_first_page(pdf_bytes, config.render_scale)?;
    Ok(DocumentContent::PageImage(png))
}
