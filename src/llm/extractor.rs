use log::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::EmptyCause;
use crate::llm::parsing::parse_response;
use crate::llm::prompts::{image_instruction, text_instruction};
use crate::llm::service::ExtractionService;
use crate::schema::ExtractionOutcome;
use crate::utils::truncate_chars;

/// Per-upload gateway to the extraction service.
///
/// Holds a budget of exactly one service call. Create a fresh extractor for
/// every upload; once the call is spent, further requests return an empty
/// outcome without touching the service.
pub struct TransactionExtractor<'a> {
    service: &'a dyn ExtractionService,
    text_char_limit: usize,
    calls_made: usize,
}

impl<'a> TransactionExtractor<'a> {
    pub fn new(service: &'a dyn ExtractionService, config: &PipelineConfig) -> Self {
        Self {
            service,
            text_char_limit: config.text_char_limit,
            calls_made: 0,
        }
    }

    pub fn calls_made(&self) -> usize {
        self.calls_made
    }

    fn claim_call(&mut self) -> bool {
        if self.calls_made > 0 {
            warn!("Refusing a second extraction service call for this upload");
            return false;
        }
        self.calls_made += 1;
        true
    }

    /// Text path: the first `text_char_limit` characters are submitted.
    pub async fn extract_from_text(&mut self, text: &str) -> ExtractionOutcome {
        if text.trim().is_empty() {
            debug!("Nothing to send to the extraction service");
            return ExtractionOutcome::empty(EmptyCause::NoRecords);
        }
        if !self.claim_call() {
            return ExtractionOutcome::empty(EmptyCause::CallBudgetExhausted);
        }

        let text = truncate_chars(text, self.text_char_limit);
        debug!("Submitting {} characters of text for extraction", text.chars().count());

        match self
            .service
            .generate_from_text(text, &text_instruction())
            .await
        {
            Ok(reply) => parse_response(&reply),
            Err(e) => {
                warn!("Text extraction failed: {}", e);
                ExtractionOutcome::empty(EmptyCause::ServiceFailure)
            }
        }
    }

    /// Image path: raw bytes plus their media type.
    pub async fn extract_from_image(&mut self, image: &[u8], media_type: &str) -> ExtractionOutcome {
        if image.is_empty() {
            debug!("Empty image upload");
            return ExtractionOutcome::empty(EmptyCause::NoRecords);
        }
        if !self.claim_call() {
            return ExtractionOutcome::empty(EmptyCause::CallBudgetExhausted);
        }

        debug!(
            "Submitting {} byte {} image for extraction",
            image.len(),
            media_type
        );

        match self
            .service
            .generate_from_image(image, media_type, &image_instruction())
            .await
        {
            Ok(reply) => parse_response(&reply),
            Err(e) => {
                warn!("Image extraction failed: {}", e);
                ExtractionOutcome::empty(EmptyCause::ServiceFailure)
            }
        }
    }
}
