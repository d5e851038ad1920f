use log::{debug, error, warn};
use tokio::time::sleep;

use crate::config::{GenerationSettings, Pacing, RetryPolicy};
use crate::error::{ReviewBuilderError, Result};
use crate::llm::rate_limit::RateLimiter;
use crate::llm::types::{ContentGenerator, GenerateContentRequest};

/// Sends requests one at a time under the rate limiter, with pacing and the
/// quota backoff policy.
pub struct RequestDriver<'a, G: ContentGenerator + ?Sized> {
    generator: &'a G,
    model: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
    pacing: Pacing,
}

impl<'a, G: ContentGenerator + ?Sized> RequestDriver<'a, G> {
    pub fn new(generator: &'a G, settings: &GenerationSettings) -> Self {
        Self {
            generator,
            model: settings.model.clone(),
            limiter: RateLimiter::new(settings.rate_limit),
            retry: settings.retry,
            pacing: settings.pacing,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// One outbound call: limiter check, record, send. No retry, no pacing.
    pub async fn send_once(&mut self, request: &GenerateContentRequest) -> Result<String> {
        self.limiter.check_limit().await?;
        self.limiter.record_request();
        self.generator.generate_content(&self.model, request).await
    }

    /// Sends `request`, retrying only quota errors with exponential backoff.
    ///
    /// Any other error is returned straight away. After the last failed
    /// attempt the result is [`ReviewBuilderError::RetriesExhausted`].
    pub async fn send_with_backoff(&mut self, request: &GenerateContentRequest) -> Result<String> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.send_once(request).await {
                Ok(text) => {
                    self.pace().await;
                    return Ok(text);
                }
                Err(e) if e.is_quota_exhausted() => {
                    let wait = self.retry.backoff_delay(attempt);
                    warn!(
                        "Rate limit hit. Waiting {:.1} seconds before retrying... (Attempt {}/{})",
                        wait.as_secs_f64(),
                        attempt + 1,
                        max_attempts
                    );
                    last_error = e.to_string();
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }

        error!("Giving up after {} rate-limited attempts", max_attempts);
        Err(ReviewBuilderError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    pub async fn pace(&self) {
        let delay = self.pacing.delay();
        if !delay.is_zero() {
            debug!("Pacing for {:.2}s", delay.as_secs_f64());
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::llm::testing::ScriptedGenerator;
    use crate::llm::types::Content;
    use std::time::Duration;
    use tokio::time::Instant;

    fn request() -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user("payload")],
            system_instruction: None,
            generation_config: Default::default(),
        }
    }

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

    #[tokio::test(start_paused = true)]
    async fn test_quota_errors_are_retried() {
        let generator = ScriptedGenerator::new(vec![
            Err(ScriptedGenerator::quota_error()),
            Err(ScriptedGenerator::quota_error()),
            Ok("done".to_string()),
        ]);
        let mut driver = RequestDriver::new(&generator, &settings());
        let start = Instant::now();

        let text = driver.send_with_backoff(&request()).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(generator.calls(), 3);
        // 1s + 2s of base backoff, plus jitter below 1s each.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(5));
        assert_eq!(driver.limiter().daily_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let generator = ScriptedGenerator::new(
            (0..10).map(|_| Err(ScriptedGenerator::quota_error())).collect(),
        );
        let mut driver = RequestDriver::new(&generator, &settings());

        let err = driver.send_with_backoff(&request()).await.unwrap_err();
        assert!(matches!(err, ReviewBuilderError::RetriesExhausted { attempts: 5, .. }));
        assert_eq!(generator.calls(), 5);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let generator = ScriptedGenerator::new(vec![
            Err(ReviewBuilderError::Api {
                status: 400,
                message: "bad request".into(),
            }),
            Ok("unreachable".to_string()),
        ]);
        let mut driver = RequestDriver::new(&generator, &settings());

        let err = driver.send_with_backoff(&request()).await.unwrap_err();
        assert!(matches!(err, ReviewBuilderError::Api { status: 400, .. }));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_daily_cap_stops_before_sending() {
        let generator = ScriptedGenerator::new(vec![Ok("a".into()), Ok("b".into())]);
        let mut settings = settings();
        settings.rate_limit.max_requests_per_day = 1;
        let mut driver = RequestDriver::new(&generator, &settings);

        driver.send_with_backoff(&request()).await.unwrap();
        let err = driver.send_with_backoff(&request()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_paced() {
        let generator = ScriptedGenerator::new(vec![Ok("a".into())]);
        let mut settings = settings();
        settings.pacing = Pacing::Fixed { seconds: 5.0 };
        let mut driver = RequestDriver::new(&generator, &settings);
        let start = Instant::now();

        driver.send_with_backoff(&request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
