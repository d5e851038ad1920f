use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ReviewBuilderError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role("model", text)
    }

    fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Text of the last user turn, mostly useful for logging and fakes.
    pub fn last_user_text(&self) -> Option<&str> {
        self.contents
            .iter()
            .rev()
            .find(|c| c.role == "user")
            .and_then(|c| c.parts.first())
            .and_then(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::Other(_) => None,
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn into_text(self) -> Result<String> {
        let part = self
            .candidates
            .ok_or_else(|| ReviewBuilderError::MalformedReply("No candidates returned".to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ReviewBuilderError::MalformedReply("Empty candidates list".to_string()))?
            .content
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| ReviewBuilderError::MalformedReply("No parts in content".to_string()))?;

        match part {
            Part::Text { text } => Ok(text),
            Part::Other(_) => Err(ReviewBuilderError::MalformedReply(
                "Model returned non-text content".to_string(),
            )),
        }
    }
}

/// Anything that can answer a `generateContent` call.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest)
        -> Result<String>;
}
