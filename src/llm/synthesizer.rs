use log::{error, info, warn};
use serde::Serialize;

use crate::config::{GenerationSettings, SynthesisMode};
use crate::error::Result;
use crate::ingestion::{ReviewTableWriter, SetCell, SetTable, SetTableRow};
use crate::llm::driver::RequestDriver;
use crate::llm::session::{SessionKey, SessionStore};
use crate::llm::types::{Content, ContentGenerator, GenerateContentRequest, GenerationConfig};
use crate::normalize::normalize_reply;
use crate::schema::{review_response_schema, ReviewResult, NOT_AVAILABLE};

#[derive(Debug, Serialize)]
struct ProjectInfo<'a> {
    project_name: &'a str,
    positive_phrases: Vec<String>,
    negative_phrases: Vec<String>,
    neutral_phrases: Vec<String>,
    duration_of_stay: &'a str,
}

/// The unit of work sent to the model for one project set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub project_name: String,
    pub set_number: usize,
    /// JSON array holding a single project-info record.
    pub phrases_payload: String,
    pub duration: String,
}

impl GenerationRequest {
    /// `None` when the cell has no usable phrases.
    pub fn from_set(project_name: &str, cell: &SetCell) -> Result<Option<Self>> {
        let tokens: Vec<&str> = cell
            .phrases
            .lines()
            .flat_map(|line| line.split("; "))
            .map(|t| t.trim().trim_end_matches(';').trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut info = ProjectInfo {
            project_name,
            positive_phrases: Vec::new(),
            negative_phrases: Vec::new(),
            neutral_phrases: Vec::new(),
            duration_of_stay: NOT_AVAILABLE,
        };
        for token in tokens {
            if token.contains("(positive)") {
                info.positive_phrases.push(token.replace(" (positive)", ""));
            } else if token.contains("(negative)") {
                info.negative_phrases.push(token.replace(" (negative)", ""));
            } else {
                info.neutral_phrases.push(token.to_string());
            }
        }

        let duration = cell
            .duration
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(NOT_AVAILABLE);
        info.duration_of_stay = duration;

        Ok(Some(Self {
            project_name: project_name.to_string(),
            set_number: cell.number,
            phrases_payload: serde_json::to_string(&[&info])?,
            duration: duration.to_string(),
        }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisSummary {
    pub projects: usize,
    pub generated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Turns partitioned phrase sets into structured reviews.
pub struct ReviewSynthesizer<'a, G: ContentGenerator + ?Sized> {
    driver: RequestDriver<'a, G>,
    mode: SynthesisMode,
    system_instruction: String,
    config: GenerationConfig,
    sessions: SessionStore,
}

impl<'a, G: ContentGenerator + ?Sized> ReviewSynthesizer<'a, G> {
    pub fn new(
        generator: &'a G,
        system_instruction: impl Into<String>,
        settings: &GenerationSettings,
        mode: SynthesisMode,
    ) -> Result<Self> {
        let system_instruction = system_instruction.into();
        let config = GenerationConfig {
            temperature: settings.temperature,
            top_p: settings.top_p,
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(review_response_schema()?),
        };

        Ok(Self {
            driver: RequestDriver::new(generator, settings),
            mode,
            sessions: SessionStore::new(system_instruction.clone(), config.clone()),
            system_instruction,
            config,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Generates one review cell. Only fatal errors are returned; everything
    /// else becomes a placeholder review.
    pub async fn synthesize_set(&mut self, request: &GenerationRequest) -> Result<String> {
        info!(
            "Sending payload to Gemini for {} (Set {})",
            request.project_name, request.set_number
        );

        let reply = match self.mode {
            SynthesisMode::SingleShot => {
                let api_request = GenerateContentRequest {
                    contents: vec![Content::user(request.phrases_payload.clone())],
                    system_instruction: Some(Content::user(self.system_instruction.clone())),
                    generation_config: self.config.clone(),
                };
                match self.driver.send_with_backoff(&api_request).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => Err(format!("Error: {}", e)),
                }
            }
            SynthesisMode::Session => {
                let key = SessionKey::new(request.project_name.clone(), request.set_number);
                self.sessions
                    .send_with_recovery(&mut self.driver, &key, &request.phrases_payload)
                    .await?
                    .ok_or_else(|| "Error: session request failed twice".to_string())
            }
        };

        let diagnostic = match reply {
            Ok(text) => match normalize_reply(&text, Some(&request.duration)) {
                Ok(review) => return Ok(serde_json::to_string(&review)?),
                Err(e) => format!("Error: {}", e),
            },
            Err(diagnostic) => diagnostic,
        };

        warn!(
            "Failed for {} (Set {}): {}",
            request.project_name, request.set_number, diagnostic
        );
        ReviewResult::placeholder(&diagnostic).to_json()
    }

    /// One cell per set slot of `row`; empty slots stay empty.
    pub async fn synthesize_project(
        &mut self,
        row: &SetTableRow,
        summary: &mut SynthesisSummary,
    ) -> Result<Vec<String>> {
        let mut reviews = Vec::with_capacity(row.sets.len());

        for slot in &row.sets {
            let request = match slot {
                Some(cell) => GenerationRequest::from_set(&row.project_name, cell)?,
                None => None,
            };
            let Some(request) = request else {
                summary.skipped += 1;
                reviews.push(String::new());
                continue;
            };

            let review = self.synthesize_set(&request).await?;
            if is_placeholder(&review) {
                summary.failed += 1;
            } else {
                summary.generated += 1;
                info!("Success: {} - Set {}", row.project_name, request.set_number);
            }
            reviews.push(review);
        }

        Ok(reviews)
    }

    /// Processes every project row, writing each one as soon as it completes.
    pub async fn run(
        &mut self,
        table: &SetTable,
        writer: &mut ReviewTableWriter,
    ) -> Result<SynthesisSummary> {
        let mut summary = SynthesisSummary::default();
        let total = table.rows.len();

        for (idx, row) in table.rows.iter().enumerate() {
            info!(
                "Processing project {}/{}: {} (ID: {})",
                idx + 1,
                total,
                row.project_name,
                row.xid
            );

            let reviews = match self.synthesize_project(row, &mut summary).await {
                Ok(reviews) => reviews,
                Err(e) => {
                    error!("Stopping run at project {}: {}", row.project_name, e);
                    return Err(e);
                }
            };
            writer.write_row(&row.xid, &row.project_name, &reviews)?;
            summary.projects += 1;
        }

        Ok(summary)
    }
}

fn is_placeholder(review: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(review)
        .ok()
        .and_then(|v| v.get("positive_review")?.as_str().map(|p| p.starts_with("Error:")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Pacing, RateLimitConfig};
    use crate::error::ReviewBuilderError;
    use crate::llm::testing::ScriptedGenerator;
    use serde_json::{json, Value};

    fn settings() -> GenerationSettings {
        GenerationSettings {
            pacing: Pacing::None,
            rate_limit: RateLimitConfig {
                max_requests_per_minute: 0,
                max_requests_per_day: 100,
            },
            ..GenerationSettings::for_synthesis()
        }
    }

    fn cell(phrases: &str, duration: Option<&str>) -> SetCell {
        numbered(1, phrases, duration)
    }

    fn numbered(number: usize, phrases: &str, duration: Option<&str>) -> SetCell {
        SetCell {
            number,
            phrases: phrases.to_string(),
            duration: duration.map(str::to_string),
        }
    }

    #[test]
    fn test_request_payload_splits_tokens() {
        let request = GenerationRequest::from_set(
            "Lake View",
            &numbered(
                2,
                "clean lobby (positive); noisy road (negative)\nnice people",
                Some("3.5 Years"),
            ),
        )
        .unwrap()
        .unwrap();

        let payload: Value = serde_json::from_str(&request.phrases_payload).unwrap();
        assert_eq!(
            payload,
            json!([{
                "project_name": "Lake View",
                "positive_phrases": ["clean lobby"],
                "negative_phrases": ["noisy road"],
                "neutral_phrases": ["nice people"],
                "duration_of_stay": "3.5 Years"
            }])
        );
        assert_eq!(request.duration, "3.5 Years");
    }

    #[test]
    fn test_request_duration_defaults_to_na() {
        let request = GenerationRequest::from_set("A", &cell("x (positive)", None))
            .unwrap()
            .unwrap();
        assert_eq!(request.duration, "NA");
        assert!(GenerationRequest::from_set("A", &cell(" ; \n", None))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reply_is_normalized() {
        let generator = ScriptedGenerator::new(vec![Ok(json!({
            "positive_review": "Good", "negative_review": "Bad",
            "society_management": 4, "green_area": null, "amenities": 2,
            "connectivity": "NA", "construction": "NA"
        })
        .to_string())]);
        let mut synthesizer =
            ReviewSynthesizer::new(&generator, "sys", &settings(), SynthesisMode::SingleShot)
                .unwrap();
        let request = GenerationRequest::from_set("A", &cell("x (positive)", Some("2.0 Years")))
            .unwrap()
            .unwrap();

        let review: Value =
            serde_json::from_str(&synthesizer.synthesize_set(&request).await.unwrap()).unwrap();
        assert_eq!(review["overall"], json!("3"));
        assert_eq!(review["green_area"], json!("NA"));
        assert_eq!(review["duration_of_stay"], json!("2.0 Years"));

        let requests = generator.requests();
        let sent = &requests[0];
        assert_eq!(
            sent.generation_config.response_mime_type.as_deref(),
            Some("application/json")
        );
        assert!(sent.generation_config.response_schema.is_some());
        assert_eq!(sent.generation_config.temperature, Some(1.2));
    }

    #[tokio::test]
    async fn test_unparseable_reply_becomes_placeholder() {
        let generator = ScriptedGenerator::new(vec![Ok("sorry, no JSON".into())]);
        let mut synthesizer =
            ReviewSynthesizer::new(&generator, "sys", &settings(), SynthesisMode::SingleShot)
                .unwrap();
        let request = GenerationRequest::from_set("A", &cell("x (positive)", None))
            .unwrap()
            .unwrap();

        let raw = synthesizer.synthesize_set(&request).await.unwrap();
        let review: ReviewResult = serde_json::from_str(&raw).unwrap();
        assert!(review.positive_review.starts_with("Error:"));
        assert_eq!(review.overall, "NA");
        assert!(is_placeholder(&raw));
    }

    #[tokio::test]
    async fn test_daily_cap_aborts() {
        let generator = ScriptedGenerator::new(vec![Ok("{}".into()), Ok("{}".into())]);
        let mut settings = settings();
        settings.rate_limit.max_requests_per_day = 1;
        let mut synthesizer =
            ReviewSynthesizer::new(&generator, "sys", &settings, SynthesisMode::Session).unwrap();
        let request = GenerationRequest::from_set("A", &cell("x (positive)", None))
            .unwrap()
            .unwrap();

        synthesizer.synthesize_set(&request).await.unwrap();
        let err = synthesizer.synthesize_set(&request).await.unwrap_err();
        assert!(matches!(err, ReviewBuilderError::DailyLimitReached { .. }));
    }

    #[tokio::test]
    async fn test_session_mode_keys_by_project_and_set() {
        let generator = ScriptedGenerator::from_fn(|_| Ok("{\"overall\": \"4\"}".to_string()));
        let mut synthesizer =
            ReviewSynthesizer::new(&generator, "sys", &settings(), SynthesisMode::Session).unwrap();
        let row = SetTableRow {
            xid: "P1".into(),
            project_name: "Lake View".into(),
            sets: vec![
                Some(numbered(1, "a (positive)", None)),
                None,
                Some(numbered(3, "b (negative)", None)),
            ],
        };
        let mut summary = SynthesisSummary::default();

        let reviews = synthesizer.synthesize_project(&row, &mut summary).await.unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(reviews[1], "");
        assert_eq!(synthesizer.sessions().len(), 2);
        assert!(synthesizer
            .sessions()
            .get(&SessionKey::new("Lake View", 3))
            .is_some());
        assert_eq!(summary.generated, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_skipped_set_numbers_key_sessions() {
        let generator = ScriptedGenerator::from_fn(|_| Ok("{\"overall\": \"4\"}".to_string()));
        let mut synthesizer =
            ReviewSynthesizer::new(&generator, "sys", &settings(), SynthesisMode::Session).unwrap();
        let row = SetTableRow {
            xid: "P1".into(),
            project_name: "Lake View".into(),
            sets: vec![
                Some(numbered(1, "a (positive)", None)),
                Some(numbered(3, "b (negative)", None)),
            ],
        };
        let mut summary = SynthesisSummary::default();

        let reviews = synthesizer.synthesize_project(&row, &mut summary).await.unwrap();
        assert_eq!(reviews.len(), 2);
        let sessions = synthesizer.sessions();
        assert!(sessions.get(&SessionKey::new("Lake View", 3)).is_some());
        assert!(sessions.get(&SessionKey::new("Lake View", 2)).is_none());
    }
}
