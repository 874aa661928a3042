use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to the uploader whenever no path produced a usable record.
pub const EXTRACTION_EMPTY_MESSAGE: &str = "Could not extract transactions. This may be due to API rate limits. Please wait a minute and try again, or use a CSV with columns: Date, Description, Amount";

/// Internal diagnostic attached to an empty extraction outcome.
///
/// Several root causes collapse into one user-facing message; this code keeps
/// them apart for logs and callers that want to know more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCause {
    /// The source was readable but contained no transactions.
    NoRecords,
    /// Tabular text could not be parsed as a table.
    UnparsableTable,
    /// The document could not be read or rendered.
    UnreadableDocument,
    /// The extraction service returned an error or timed out.
    ServiceFailure,
    /// The extraction service replied with something that is not a JSON array.
    MalformedResponse,
    /// A second service call was attempted for the same upload.
    CallBudgetExhausted,
}

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Unable to decode file as text: {0}")]
    Decode(String),

    #[error("Unsupported file type '{0}'. Please upload CSV, PDF, or image (JPG, PNG, WebP, HEIC)")]
    UnsupportedFormat(String),

    #[error("{}", EXTRACTION_EMPTY_MESSAGE)]
    ExtractionEmpty { cause: EmptyCause },

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Extraction service error: {0}")]
    Service(String),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StatementError {
    /// True for failures caused by the upload itself rather than by this crate.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StatementError::Decode(_)
                | StatementError::UnsupportedFormat(_)
                | StatementError::ExtractionEmpty { .. }
        )
    }

    /// Short reason string suitable for a transport-level error body.
    pub fn client_reason(&self) -> String {
        match self {
            StatementError::Decode(_) => "Unable to decode CSV file".to_string(),
            StatementError::UnsupportedFormat(_) => {
                "Unsupported file type. Please upload CSV, PDF, or image (JPG, PNG, WebP, HEIC)"
                    .to_string()
            }
            StatementError::ExtractionEmpty { .. } => EXTRACTION_EMPTY_MESSAGE.to_string(),
            _ => "Internal error while processing the statement".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatementError>;
