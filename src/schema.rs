use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Sentinel used for ratings and fields the model could not fill.
pub const NOT_AVAILABLE: &str = "NA";

/// The five category ratings that feed the `overall` fallback.
pub const CATEGORY_FIELDS: [&str; 5] = [
    "society_management",
    "green_area",
    "amenities",
    "connectivity",
    "construction",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Classifies a free-text label by substring, `positive` winning over `negative`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("positive") {
            Sentiment::Positive
        } else if lower.contains("negative") {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseRecord {
    pub project_id: String,
    pub project_name: String,
    pub phrase_text: String,
    pub sentiment: Sentiment,
    pub stay_duration_years: u32,
}

/// One bucket of phrases destined for a single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseSet {
    /// `"<phrase> (positive|negative)"` tokens joined with `"; "`.
    pub formatted_phrases: String,
    /// `"<mean to 1 decimal> Years"`.
    pub avg_duration: String,
    pub positive_count: usize,
    pub negative_count: usize,
}

impl PhraseSet {
    pub fn is_empty(&self) -> bool {
        self.positive_count == 0 && self.negative_count == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ReviewResult {
    #[schemars(description = "What residents like about the society, written in first person")]
    pub positive_review: String,

    #[schemars(description = "What residents dislike about the society, written in first person")]
    pub negative_review: String,

    #[schemars(description = "Rating 1-5 for society management, or \"NA\" if not covered")]
    #[serde(deserialize_with = "rating")]
    pub society_management: String,

    #[schemars(description = "Rating 1-5 for green area and open spaces, or \"NA\" if not covered")]
    #[serde(deserialize_with = "rating")]
    pub green_area: String,

    #[schemars(description = "Rating 1-5 for amenities, or \"NA\" if not covered")]
    #[serde(deserialize_with = "rating")]
    pub amenities: String,

    #[schemars(description = "Rating 1-5 for connectivity, or \"NA\" if not covered")]
    #[serde(deserialize_with = "rating")]
    pub connectivity: String,

    #[schemars(description = "Rating 1-5 for construction quality, or \"NA\" if not covered")]
    #[serde(deserialize_with = "rating")]
    pub construction: String,

    #[schemars(description = "Overall rating 1-5, or \"NA\"")]
    #[serde(deserialize_with = "rating")]
    pub overall: String,

    #[schemars(description = "How long the reviewer has stayed, e.g. \"3.5 Years\"")]
    pub duration_of_stay: String,
}

impl ReviewResult {
    /// Complete result used when generation or parsing fails. The diagnostic
    /// is cut to 100 characters.
    pub fn placeholder(diagnostic: &str) -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            positive_review: diagnostic.chars().take(100).collect(),
            negative_review: String::new(),
            society_management: na(),
            green_area: na(),
            amenities: na(),
            connectivity: na(),
            construction: na(),
            overall: na(),
            duration_of_stay: na(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Ratings arrive as numbers from the model and as strings once normalized.
fn rating<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rating {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Rating::deserialize(deserializer)? {
        Rating::Text(text) => text,
        Rating::Number(number) => number.to_string(),
    })
}

/// Response schema for Gemini structured output, generated from [`ReviewResult`].
///
/// Gemini accepts an OpenAPI 3 subset, so the meta-schema reference and the
/// title are stripped.
pub fn review_response_schema() -> Result<serde_json::Value> {
    let generator = SchemaSettings::openapi3()
        .with(|settings| {
            settings.meta_schema = None;
            settings.inline_subschemas = true;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<ReviewResult>();

    let mut value = serde_json::to_value(schema)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("title");
        object.remove("definitions");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_from_label() {
        assert_eq!(Sentiment::from_label("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::from_label("very NEGATIVE"), Sentiment::Negative);
        assert_eq!(Sentiment::from_label("mixed"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label(""), Sentiment::Neutral);
    }

    #[test]
    fn test_placeholder_truncates_diagnostic() {
        let long = format!("Error: {}", "x".repeat(300));
        let result = ReviewResult::placeholder(&long);
        assert_eq!(result.positive_review.chars().count(), 100);
        assert_eq!(result.negative_review, "");
        assert_eq!(result.overall, "NA");
        assert_eq!(result.duration_of_stay, "NA");
    }

    #[test]
    fn test_numeric_ratings_read_as_strings() {
        let review: ReviewResult = serde_json::from_value(serde_json::json!({
            "positive_review": "Good", "negative_review": "Bad",
            "society_management": 4, "green_area": "NA", "amenities": 3,
            "connectivity": "", "construction": 5, "overall": "4",
            "duration_of_stay": "1.0 Years"
        }))
        .unwrap();
        assert_eq!(review.society_management, "4");
        assert_eq!(review.green_area, "NA");
        assert_eq!(review.connectivity, "");
        assert_eq!(review.overall, "4");
        assert!(serde_json::from_str::<ReviewResult>(&review.to_json().unwrap()).is_ok());
    }

    #[test]
    fn test_response_schema_shape() {
        let schema = review_response_schema().unwrap();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");

        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 9);
        assert!(schema["properties"]["overall"].is_object());
    }
}
