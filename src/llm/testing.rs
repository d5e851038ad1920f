//! In-process [`ContentGenerator`] for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ReviewBuilderError, Result};
use crate::llm::types::{ContentGenerator, GenerateContentRequest};

type Responder = Box<dyn Fn(&GenerateContentRequest) -> Result<String> + Send + Sync>;

enum Source {
    Script(VecDeque<Result<String>>),
    Responder(Responder),
}

pub struct ScriptedGenerator {
    source: Mutex<Source>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl ScriptedGenerator {
    /// Replies with `script` in order, then errors once it runs dry.
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self::with_source(Source::Script(script.into()))
    }

    /// Replies by calling `responder` with every request.
    pub fn from_fn(
        responder: impl Fn(&GenerateContentRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(Source::Responder(Box::new(responder)))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source: Mutex::new(source),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn quota_error() -> ReviewBuilderError {
        ReviewBuilderError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_content(
        &self,
        _model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut source = self
            .source
            .lock()
            .map_err(|_| ReviewBuilderError::MalformedReply("generator poisoned".to_string()))?;
        match &mut *source {
            Source::Script(script) => script.pop_front().unwrap_or_else(|| {
                Err(ReviewBuilderError::MalformedReply(
                    "script exhausted".to_string(),
                ))
            }),
            Source::Responder(responder) => responder(request),
        }
    }
}
