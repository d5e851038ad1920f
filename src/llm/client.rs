use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

use crate::config::api_key_from_env;
use crate::error::{ReviewBuilderError, Result};
use crate::llm::types::*;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Reads `GEMINI_API_KEY` (after loading `.env`); fails before any request is made.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let res = self.client.post(&url).json(request).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ReviewBuilderError::Api {
                status: status.as_u16(),
                message: err_text,
            });
        }

        let body: GenerateContentResponse = res.json().await?;
        let text = body.into_text()?;
        debug!("Gemini replied with {} characters", text.len());
        Ok(text)
    }
}
