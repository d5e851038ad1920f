use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::Persona;
use crate::error::{ReviewBuilderError, Result};

/// System instructions keyed by name, loaded from a JSON object document.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: HashMap<String, String>,
}

impl PromptLibrary {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReviewBuilderError::InputNotFound(path.to_path_buf()));
        }
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let prompts: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { prompts })
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        self.prompts
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ReviewBuilderError::PromptNotFound(key.to_string()))
    }

    pub fn for_persona(&self, persona: Persona) -> Result<&str> {
        self.get(persona.prompt_key())
    }
}

pub const REFINE_NEGATIVE_TEMPLATE: &str = r#"
Rewrite the negative points from a housing society review below so they read like real resident feedback. Keep the meaning and every key point.

Original Negative Points:
{original_negative}

Rules:
1. Use plain, conversational English that a general audience understands.
2. Keep the negative sentiment.
3. Open with the concrete problem itself. Never start with filler such as "Unfortunately", "Honestly", "To be honest", "Overall", "I have to say" or "Let me be frank".
4. Write 2-3 sentences.
5. Do not add points that are not in the original.
6. Do not soften the complaint and do not contradict yourself.
7. Return ONLY the rewritten text, without headings.

Good openings:
- "The maintenance response time is extremely slow..."
- "Parking spaces are insufficient for residents..."
- "The gym equipment is poorly maintained..."

Openings to avoid:
- "Unfortunately, the maintenance response time..."
- "Honestly, I think the parking spaces..."
- "Overall, the noise levels..."
"#;

pub fn refine_negative_prompt(original_negative: &str) -> String {
    REFINE_NEGATIVE_TEMPLATE.replace("{original_negative}", original_negative)
}
