//! # Statement Insight
//!
//! Turns an uploaded bank statement (CSV, PDF or a photo of a statement) into
//! a canonical list of signed transactions, flags unusual spending with an
//! isolation forest, and summarizes the flagged set in one sentence.
//!
//! ## Core Concepts
//!
//! - **Deterministic path**: CSVs with recognizable headers and text-native
//!   PDFs are handled locally where possible
//! - **Extraction service**: a generative model consulted at most once per
//!   upload, for unrecognized tables, document text, or images
//! - **Sign convention**: negative amounts are outflows, positive are inflows
//! - **Fail-soft extraction**: internal faults become an empty outcome; only
//!   "nothing could be extracted" reaches the caller
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_insight::*;
//!
//! let processor = StatementProcessor::from_env(PipelineConfig::default())?;
//! let bytes = std::fs::read("march.csv")?;
//! let report = processor.process_upload("march.csv", &bytes).await?;
//!
//! println!("{}", report.insight);
//! ```

pub mod anomaly;
pub mod config;
pub mod document;
pub mod error;
pub mod ingestion;
pub mod insight;
pub mod llm;
pub mod renderer;
pub mod routing;
pub mod schema;
pub mod utils;

pub use anomaly::{detect_anomalies, IsolationForest};
pub use config::{PipelineConfig, DEFAULT_MODEL};
pub use document::{read_document, DocumentContent, DocumentReader, PdfDocumentReader};
pub use error::{EmptyCause, Result, StatementError, EXTRACTION_EMPTY_MESSAGE};
pub use ingestion::{decode_text, normalize_table, resolve_columns, TableParse};
pub use insight::generate_insight;
pub use llm::{ExtractionService, TransactionExtractor};
pub use routing::{extract_transactions, route, FileKind, ImageMediaType};
pub use schema::*;

#[cfg(feature = "gemini")]
pub use llm::GeminiClient;

use log::{debug, info, warn};

/// Request-scoped pipeline: route, extract, score, summarize.
///
/// Holds no per-upload state, so one processor can serve concurrent uploads.
pub struct StatementProcessor {
    service: Box<dyn ExtractionService>,
    reader: Box<dyn DocumentReader>,
    config: PipelineConfig,
}

impl StatementProcessor {
    pub fn new(service: impl ExtractionService + 'static) -> Self {
        Self {
            service: Box::new(service),
            reader: Box::new(PdfDocumentReader),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(
        service: impl ExtractionService + 'static,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service: Box::new(service),
            reader: Box::new(PdfDocumentReader),
            config,
        })
    }

    pub fn with_document_reader(mut self, reader: impl DocumentReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Gemini-backed processor; the key is read from `GEMINI_API_KEY`.
    #[cfg(feature = "gemini")]
    pub fn from_env(config: PipelineConfig) -> Result<Self> {
        let client = GeminiClient::from_env(&config)?;
        Self::with_config(client, config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process_upload(&self, filename: &str, bytes: &[u8]) -> Result<AnalysisReport> {
        let kind = route(filename)?;
        info!(
            "Processing upload '{}' ({} bytes) as {:?}",
            filename,
            bytes.len(),
            kind
        );

        let mut extractor = TransactionExtractor::new(self.service.as_ref(), &self.config);
        let outcome = extract_transactions(
            kind,
            bytes,
            self.reader.as_ref(),
            &mut extractor,
            &self.config,
        )
        .await?;
        debug!(
            "Extraction finished with {} service call(s)",
            extractor.calls_made()
        );

        if outcome.is_empty() {
            let cause = outcome.empty_cause.unwrap_or(EmptyCause::NoRecords);
            warn!("No transactions extracted from '{}': {:?}", filename, cause);
            return Err(StatementError::ExtractionEmpty { cause });
        }

        info!(
            "Extracted {} transactions from '{}'",
            outcome.len(),
            filename
        );
        Ok(analyze_transactions(outcome.transactions, &self.config))
    }
}

/// Score a transaction set and build the report payload.
pub fn analyze_transactions(
    mut transactions: Vec<Transaction>,
    config: &PipelineConfig,
) -> AnalysisReport {
    let flagged = detect_anomalies(&mut transactions, config);
    info!(
        "Flagged {} of {} transactions as unusual",
        flagged,
        transactions.len()
    );

    let anomalies: Vec<Transaction> = transactions
        .iter()
        .filter(|t| t.is_anomalous())
        .cloned()
        .collect();
    let insight = generate_insight(&anomalies);

    AnalysisReport {
        transactions,
        anomalies,
        insight,
    }
}
