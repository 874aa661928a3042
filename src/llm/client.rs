use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::{PipelineConfig, DEFAULT_MODEL};
use crate::error::{Result, StatementError};
use crate::llm::service::ExtractionService;
use crate::llm::types::*;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_config(api_key, &PipelineConfig::default())
    }

    /// Model and request timeout are taken from `config`.
    pub fn with_config(api_key: String, config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: config.model.clone(),
        })
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env(config: &PipelineConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| StatementError::InvalidConfig(format!("{} is not set", API_KEY_ENV)))?;
        Self::with_config(api_key, config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        if self.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &self.model
        }
    }

    async fn generate_content(&self, parts: Vec<Part>) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model(),
            self.api_key
        );

        let payload = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config: GenerationConfig::default(),
        };

        debug!("Calling Gemini model {}", self.model());
        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(StatementError::Service(format!(
                "Gemini API Error (status {}): {}",
                status,
                err_text.chars().take(200).collect::<String>()
            )));
        }

        let body: GenerateContentResponse = res.json().await?;

        body.first_text()
            .ok_or_else(|| StatementError::Service("Model returned no text content".to_string()))
    }
}

#[async_trait]
impl ExtractionService for GeminiClient {
    async fn generate_from_text(&self, text: &str, instruction: &str) -> Result<String> {
        self.generate_content(vec![
            Part::text(instruction),
            Part::text(format!("Text:\n{}", text)),
        ])
        .await
    }

    async fn generate_from_image(
        &self,
        image: &[u8],
        media_type: &str,
        instruction: &str,
    ) -> Result<String> {
        self.generate_content(vec![Part::inline(image, media_type), Part::text(instruction)])
            .await
    }
}
