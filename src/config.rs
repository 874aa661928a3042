use serde::{Deserialize, Serialize};

use crate::error::{Result, StatementError};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Tunables for one statement-processing pipeline.
///
/// Every field has a default, so a partial JSON/TOML document or
/// `PipelineConfig::default()` is enough to get started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model name passed to the extraction service.
    pub model: String,
    /// Maximum characters of text sent to the extraction service.
    pub text_char_limit: usize,
    /// Extracted document text must be longer than this to skip page rendering.
    pub min_document_text_len: usize,
    /// Zoom applied to the first page's MediaBox when rasterizing (1.0 = 72 DPI).
    pub render_scale: f32,
    /// Sets smaller than this are never scored.
    pub min_anomaly_sample: usize,
    /// Expected share of anomalous transactions.
    pub contamination: f64,
    pub anomaly_seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            text_char_limit: 4000,
            min_document_text_len: 100,
            render_scale: 1.5,
            min_anomaly_sample: 5,
            contamination: 0.15,
            anomaly_seed: 42,
            n_estimators: 100,
            max_samples: 256,
            request_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StatementError::InvalidConfig(
                "model must not be empty".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(StatementError::InvalidConfig(format!(
                "contamination {} must be in (0, 0.5]",
                self.contamination
            )));
        }
        if self.text_char_limit == 0 {
            return Err(StatementError::InvalidConfig(
                "text_char_limit must be positive".to_string(),
            ));
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(StatementError::InvalidConfig(
                "n_estimators and max_samples must be positive".to_string(),
            ));
        }
        if !(self.render_scale > 0.0) {
            return Err(StatementError::InvalidConfig(format!(
                "render_scale {} must be positive",
                self.render_scale
            )));
        }
        Ok(())
    }
}
