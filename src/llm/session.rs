use std::collections::HashMap;

use log::{info, warn};

use crate::error::Result;
use crate::llm::driver::RequestDriver;
use crate::llm::types::{Content, ContentGenerator, GenerateContentRequest, GenerationConfig};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub project_name: String,
    pub set_number: usize,
}

impl SessionKey {
    pub fn new(project_name: impl Into<String>, set_number: usize) -> Self {
        Self {
            project_name: project_name.into(),
            set_number,
        }
    }
}

/// A conversation with the model. Every send replays the accumulated turns.
#[derive(Debug, Clone)]
pub struct ChatSession {
    system_instruction: Content,
    config: GenerationConfig,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(system_instruction: &str, config: GenerationConfig) -> Self {
        Self {
            system_instruction: Content::user(system_instruction),
            config,
            history: Vec::new(),
        }
    }

    pub fn turns(&self) -> usize {
        self.history.len()
    }

    fn request_for(&self, message: &str) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user(message));
        GenerateContentRequest {
            contents,
            system_instruction: Some(self.system_instruction.clone()),
            generation_config: self.config.clone(),
        }
    }

    /// Sends `message`; the exchange joins the history only on success.
    pub async fn send<G: ContentGenerator + ?Sized>(
        &mut self,
        driver: &mut RequestDriver<'_, G>,
        message: &str,
    ) -> Result<String> {
        let request = self.request_for(message);
        let reply = driver.send_once(&request).await?;
        self.history.push(Content::user(message));
        self.history.push(Content::model(reply.clone()));
        Ok(reply)
    }
}

/// Sessions keyed by project and set, alive for one run.
#[derive(Debug, Clone)]
pub struct SessionStore {
    system_instruction: String,
    config: GenerationConfig,
    sessions: HashMap<SessionKey, ChatSession>,
}

impl SessionStore {
    pub fn new(system_instruction: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, key: &SessionKey) -> &mut ChatSession {
        if !self.sessions.contains_key(key) {
            info!(
                "Starting chat session for {} (Set {})",
                key.project_name, key.set_number
            );
        }
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| ChatSession::new(&self.system_instruction, self.config.clone()))
    }

    /// Drops the session so the next lookup starts a fresh conversation.
    pub fn invalidate(&mut self, key: &SessionKey) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn get(&self, key: &SessionKey) -> Option<&ChatSession> {
        self.sessions.get(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sends through the keyed session. On failure the session is recreated
    /// and the message resent once; `Ok(None)` means both attempts failed.
    /// Fatal errors are returned as `Err`.
    pub async fn send_with_recovery<G: ContentGenerator + ?Sized>(
        &mut self,
        driver: &mut RequestDriver<'_, G>,
        key: &SessionKey,
        message: &str,
    ) -> Result<Option<String>> {
        match self.get_or_create(key).send(driver, message).await {
            Ok(reply) => {
                driver.pace().await;
                return Ok(Some(reply));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(
                "Session send failed for {} (Set {}): {}. Recreating session",
                key.project_name, key.set_number, e
            ),
        }

        self.invalidate(key);
        match self.get_or_create(key).send(driver, message).await {
            Ok(reply) => {
                driver.pace().await;
                Ok(Some(reply))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    "Retry in fresh session failed for {} (Set {}): {}",
                    key.project_name, key.set_number, e
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationSettings, Pacing, RateLimitConfig};
    use crate::error::ReviewBuilderError;
    use crate::llm::testing::ScriptedGenerator;

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

    fn failure() -> ReviewBuilderError {
        ReviewBuilderError::Api {
            status: 500,
            message: "boom".into(),
        }
    }

    #[tokio::test]
    async fn test_session_accumulates_history() {
        let generator = ScriptedGenerator::new(vec![Ok("first".into()), Ok("second".into())]);
        let mut driver = RequestDriver::new(&generator, &settings());
        let mut store = SessionStore::new("be a resident", GenerationConfig::default());
        let key = SessionKey::new("Lake View", 1);

        store.send_with_recovery(&mut driver, &key, "hello").await.unwrap();
        store.send_with_recovery(&mut driver, &key, "again").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).unwrap().turns(), 4);
        let requests = generator.requests();
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[1], Content::model("first"));
    }

    #[tokio::test]
    async fn test_failure_recreates_session_once() {
        let generator = ScriptedGenerator::new(vec![
            Ok("warm up".into()),
            Err(failure()),
            Ok("recovered".into()),
        ]);
        let mut driver = RequestDriver::new(&generator, &settings());
        let mut store = SessionStore::new("sys", GenerationConfig::default());
        let key = SessionKey::new("Lake View", 2);

        store.send_with_recovery(&mut driver, &key, "one").await.unwrap();
        let reply = store.send_with_recovery(&mut driver, &key, "two").await.unwrap();

        assert_eq!(reply.as_deref(), Some("recovered"));
        let requests = generator.requests();
        assert_eq!(requests.len(), 3);
        // The resend starts from an empty conversation.
        assert_eq!(requests[2].contents, vec![Content::user("two")]);
        assert_eq!(store.get(&key).unwrap().turns(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_yields_none() {
        let generator = ScriptedGenerator::new(vec![Err(failure()), Err(failure())]);
        let mut driver = RequestDriver::new(&generator, &settings());
        let mut store = SessionStore::new("sys", GenerationConfig::default());
        let key = SessionKey::new("Lake View", 3);

        let reply = store.send_with_recovery(&mut driver, &key, "x").await.unwrap();
        assert_eq!(reply, None);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let mut store = SessionStore::new("sys", GenerationConfig::default());
        let key = SessionKey::new("A", 1);
        assert!(!store.invalidate(&key));
        store.get_or_create(&key);
        assert!(store.invalidate(&key));
        assert!(store.is_empty());
    }
}
