use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ReviewBuilderError, Result};
use crate::partition::PartitionStrategy;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PROMPT_FILE: &str = "gemini_ai_prompts.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Zero disables the per-minute gate.
    pub max_requests_per_minute: usize,
    pub max_requests_per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 15,
            max_requests_per_day: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl RetryPolicy {
    /// `2^attempt` seconds plus up to one second of jitter, `attempt` counted from 0.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = 2f64.powi(attempt.min(16) as i32);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        Duration::from_secs_f64(base + jitter)
    }
}

/// Sleep inserted after every successful call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pacing {
    None,
    Fixed { seconds: f64 },
    Uniform { min_seconds: f64, max_seconds: f64 },
}

impl Pacing {
    pub fn delay(&self) -> Duration {
        match *self {
            Pacing::None => Duration::ZERO,
            Pacing::Fixed { seconds } => Duration::from_secs_f64(seconds.max(0.0)),
            Pacing::Uniform {
                min_seconds,
                max_seconds,
            } => {
                let (lo, hi) = (min_seconds.max(0.0), max_seconds.max(0.0));
                if hi <= lo {
                    Duration::from_secs_f64(lo)
                } else {
                    Duration::from_secs_f64(rand::thread_rng().gen_range(lo..hi))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub pacing: Pacing,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::for_synthesis()
    }
}

impl GenerationSettings {
    pub fn for_synthesis() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(1.2),
            top_p: Some(0.85),
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            pacing: Pacing::Uniform {
                min_seconds: 0.5,
                max_seconds: 1.5,
            },
        }
    }

    /// Refinement uses the model's default sampling and a flat pause.
    pub fn for_refinement() -> Self {
        Self {
            temperature: None,
            top_p: None,
            pacing: Pacing::Fixed { seconds: 5.0 },
            ..Self::for_synthesis()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Applies `GEMINI_MODEL` when set.
    pub fn with_env_overrides(self) -> Self {
        match std::env::var("GEMINI_MODEL") {
            Ok(model) if !model.trim().is_empty() => self.with_model(model.trim()),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// One stateless request per set, retried with backoff on quota errors.
    #[default]
    SingleShot,
    /// A conversation per `(project, set)`, recreated once on failure.
    Session,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    Default,
    Resident,
    Family,
    Female,
    Elderly,
}

impl Persona {
    pub fn prompt_key(&self) -> &'static str {
        match self {
            Persona::Default => "system_instruction_review_generator",
            Persona::Resident => "system_instruction_resident",
            Persona::Family => "system_instruction_family",
            Persona::Female => "system_instruction_female",
            Persona::Elderly => "system_instruction_elderly",
        }
    }
}

/// Loads `.env` if present and returns the Gemini API key.
pub fn api_key_from_env() -> Result<String> {
    dotenv::dotenv().ok();
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(ReviewBuilderError::MissingApiKey),
    }
}

fn env_choice(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn invalid(name: &str, value: String) -> ReviewBuilderError {
    ReviewBuilderError::InvalidConfig {
        name: name.to_string(),
        value,
    }
}

pub fn parse_partition_strategy(value: &str) -> Result<PartitionStrategy> {
    match value {
        "fixed" | "fixed_count" => Ok(PartitionStrategy::fixed_count()),
        "exhaustive" | "round_robin" => Ok(PartitionStrategy::exhaustive()),
        other => Err(invalid("PARTITION_STRATEGY", other.to_string())),
    }
}

pub fn parse_synthesis_mode(value: &str) -> Result<SynthesisMode> {
    match value {
        "single" | "single_shot" => Ok(SynthesisMode::SingleShot),
        "session" => Ok(SynthesisMode::Session),
        other => Err(invalid("SYNTHESIS_MODE", other.to_string())),
    }
}

pub fn parse_persona(value: &str) -> Result<Persona> {
    match value {
        "default" => Ok(Persona::Default),
        "resident" => Ok(Persona::Resident),
        "family" => Ok(Persona::Family),
        "female" => Ok(Persona::Female),
        "elderly" => Ok(Persona::Elderly),
        other => Err(invalid("REVIEW_PERSONA", other.to_string())),
    }
}

pub fn partition_strategy_from_env() -> Result<PartitionStrategy> {
    env_choice("PARTITION_STRATEGY")
        .map(|v| parse_partition_strategy(&v))
        .unwrap_or_else(|| Ok(PartitionStrategy::default()))
}

pub fn synthesis_mode_from_env() -> Result<SynthesisMode> {
    env_choice("SYNTHESIS_MODE")
        .map(|v| parse_synthesis_mode(&v))
        .unwrap_or(Ok(SynthesisMode::default()))
}

pub fn persona_from_env() -> Result<Persona> {
    env_choice("REVIEW_PERSONA")
        .map(|v| parse_persona(&v))
        .unwrap_or(Ok(Persona::default()))
}
