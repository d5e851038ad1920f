use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewBuilderError {
    #[error("GEMINI_API_KEY is not set. Add it to the environment or a .env file")]
    MissingApiKey,

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Prompt '{0}' is missing from the prompt document")]
    PromptNotFound(String),

    #[error("Invalid configuration value for {name}: {value}")]
    InvalidConfig { name: String, value: String },

    #[error("Daily request limit of {limit} reached")]
    DailyLimitReached { limit: u32 },

    #[error("Gemini API Error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Malformed model reply: {0}")]
    MalformedReply(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ReviewBuilderError {
    /// True for provider quota signatures that the backoff loop should retry.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            ReviewBuilderError::Api { status, message } => {
                *status == 429 || mentions_quota(message)
            }
            ReviewBuilderError::MalformedReply(message) => mentions_quota(message),
            #[cfg(feature = "gemini")]
            ReviewBuilderError::Http(err) => err
                .status()
                .is_some_and(|status| status.as_u16() == 429),
            _ => false,
        }
    }

    /// Errors that must stop the whole run instead of degrading one request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReviewBuilderError::MissingApiKey
                | ReviewBuilderError::InputNotFound(_)
                | ReviewBuilderError::PromptNotFound(_)
                | ReviewBuilderError::InvalidConfig { .. }
                | ReviewBuilderError::DailyLimitReached { .. }
        )
    }
}

fn mentions_quota(message: &str) -> bool {
    let lower = message.to_lowercase();
    message.contains("RESOURCE_EXHAUSTED") || (lower.contains("429") && lower.contains("quota"))
}

pub type Result<T> = std::result::Result<T, ReviewBuilderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_classification() {
        let status_only = ReviewBuilderError::Api {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        assert!(status_only.is_quota_exhausted());

        let provider_status = ReviewBuilderError::Api {
            status: 503,
            message: r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#.to_string(),
        };
        assert!(provider_status.is_quota_exhausted());

        let server_error = ReviewBuilderError::Api {
            status: 500,
            message: "internal".to_string(),
        };
        assert!(!server_error.is_quota_exhausted());
        assert!(!ReviewBuilderError::DailyLimitReached { limit: 10 }.is_quota_exhausted());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ReviewBuilderError::MissingApiKey.is_fatal());
        assert!(ReviewBuilderError::DailyLimitReached { limit: 1 }.is_fatal());
        assert!(!ReviewBuilderError::MalformedReply("x".into()).is_fatal());
        assert!(!ReviewBuilderError::RetriesExhausted {
            attempts: 5,
            last_error: "429".into()
        }
        .is_fatal());
    }
}
