use async_trait::async_trait;

use crate::error::Result;

/// External document-understanding service.
///
/// Implementations return the model's raw free-text reply; nothing about its
/// shape is trusted until [`crate::llm::parse_response`] has recovered it.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn generate_from_text(&self, text: &str, instruction: &str) -> Result<String>;

    async fn generate_from_image(
        &self,
        image: &[u8],
        media_type: &str,
        instruction: &str,
    ) -> Result<String>;
}
