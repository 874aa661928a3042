use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::document::{read_document, DocumentContent, DocumentReader};
use crate::error::{EmptyCause, Result, StatementError};
use crate::ingestion::{decode_text, normalize_table, TableParse};
use crate::llm::TransactionExtractor;
use crate::schema::ExtractionOutcome;
use crate::utils::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMediaType {
    Jpeg,
    Png,
    Webp,
    Heic,
}

impl ImageMediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Webp => "image/webp",
            ImageMediaType::Heic => "image/heic",
        }
    }
}

/// Terminal extraction path chosen for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Tabular,
    Document,
    Image(ImageMediaType),
}

/// Pick the extraction path from the filename's extension alone.
pub fn route(filename: &str) -> Result<FileKind> {
    let extension = filename
        .trim()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let kind = match extension.as_str() {
        "csv" => FileKind::Tabular,
        "pdf" => FileKind::Document,
        "jpg" | "jpeg" => FileKind::Image(ImageMediaType::Jpeg),
        "png" => FileKind::Image(ImageMediaType::Png),
        "webp" => FileKind::Image(ImageMediaType::Webp),
        "heic" | "heif" => FileKind::Image(ImageMediaType::Heic),
        _ => return Err(StatementError::UnsupportedFormat(filename.to_string())),
    };

    debug!("Routed '{}' to {:?}", filename, kind);
    Ok(kind)
}

/// Run the chosen path, falling back to the extraction service when the
/// deterministic step cannot finish the job.
///
/// Only a text decoding failure is reported as an error; every other fault
/// ends as an empty outcome.
pub async fn extract_transactions(
    kind: FileKind,
    bytes: &[u8],
    reader: &dyn DocumentReader,
    extractor: &mut TransactionExtractor<'_>,
    config: &PipelineConfig,
) -> Result<ExtractionOutcome> {
    let outcome = match kind {
        FileKind::Tabular => {
            let text = decode_text(bytes)?;
            match normalize_table(&text) {
                TableParse::Parsed(outcome) => outcome,
                TableParse::Unrecognized => {
                    info!("Table headers not recognized, using extraction service");
                    let prefix = truncate_chars(&text, config.text_char_limit);
                    extractor.extract_from_text(prefix).await
                }
            }
        }
        FileKind::Document => match read_document(reader, bytes, config) {
            Ok(DocumentContent::Text(text)) => extractor.extract_from_text(&text).await,
            Ok(DocumentContent::PageImage(png)) => {
                extractor
                    .extract_from_image(&png, ImageMediaType::Png.as_str())
                    .await
            }
            Err(e) => {
                warn!("Document could not be read: {}", e);
                ExtractionOutcome::empty(EmptyCause::UnreadableDocument)
            }
        },
        FileKind::Image(media_type) => {
            extractor
                .extract_from_image(bytes, media_type.as_str())
                .await
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_by_extension_case_insensitively() {
        assert_eq!(route("statement.CSV").unwrap(), FileKind::Tabular);
        assert_eq!(route("March.Statement.pdf").unwrap(), FileKind::Document);
        assert_eq!(
            route("receipt.JPG").unwrap(),
            FileKind::Image(ImageMediaType::Jpeg)
        );
        assert_eq!(
            route("receipt.jpeg").unwrap(),
            FileKind::Image(ImageMediaType::Jpeg)
        );
        assert_eq!(
            route("scan.png").unwrap(),
            FileKind::Image(ImageMediaType::Png)
        );
        assert_eq!(
            route("scan.webp").unwrap(),
            FileKind::Image(ImageMediaType::Webp)
        );
        assert_eq!(
            route("IMG_0001.HEIF").unwrap(),
            FileKind::Image(ImageMediaType::Heic)
        );
    }

    #[test]
    fn test_unknown_extensions_are_rejected() {
        for name in ["notes.txt", "statement.xlsx", "photo.gif", "README", "csv", ""] {
            assert!(
                matches!(route(name), Err(StatementError::UnsupportedFormat(_))),
                "{:?} should be unsupported",
                name
            );
        }
    }

    #[test]
    fn test_media_types() {
        assert_eq!(ImageMediaType::Heic.as_str(), "image/heic");
        assert_eq!(ImageMediaType::Webp.as_str(), "image/webp");
    }
}
