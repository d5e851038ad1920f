use std::path::Path;

use csv::StringRecord;
use log::{info, warn};

use crate::config::GenerationSettings;
use crate::error::Result;
use crate::ingestion::RawTable;
use crate::llm::driver::RequestDriver;
use crate::llm::prompts::refine_negative_prompt;
use crate::llm::types::{Content, ContentGenerator, GenerateContentRequest, GenerationConfig};

pub const NEGATIVE_COLUMN: &str = "negative";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineSummary {
    pub rows: usize,
    pub enhanced: usize,
    pub kept_original: usize,
    pub skipped: usize,
}

/// Rewrites the negative text of existing reviews into more natural prose.
pub struct NegativeReviewRefiner<'a, G: ContentGenerator + ?Sized> {
    driver: RequestDriver<'a, G>,
    config: GenerationConfig,
}

impl<'a, G: ContentGenerator + ?Sized> NegativeReviewRefiner<'a, G> {
    pub fn new(generator: &'a G, settings: &GenerationSettings) -> Self {
        Self {
            driver: RequestDriver::new(generator, settings),
            config: GenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                ..Default::default()
            },
        }
    }

    /// The rewritten text, or `None` when the original should be kept.
    pub async fn refine(&mut self, original_negative: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(refine_negative_prompt(original_negative))],
            system_instruction: None,
            generation_config: self.config.clone(),
        };

        match self.driver.send_with_backoff(&request).await {
            Ok(text) => {
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Error enhancing content: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn run(&mut self, input: &Path, output: &Path) -> Result<RefineSummary> {
        let table = RawTable::read(input)?;
        let negative_idx = table.column(NEGATIVE_COLUMN);
        if negative_idx.is_none() {
            warn!(
                "{} has no '{}' column; rows are copied unchanged",
                input.display(),
                NEGATIVE_COLUMN
            );
        }

        let mut writer = table.create_writer(output)?;
        let mut summary = RefineSummary::default();

        for (idx, row) in table.rows.iter().enumerate() {
            let number = idx + 1;
            info!("Processing review {}...", number);
            summary.rows += 1;

            let original = negative_idx
                .and_then(|i| row.get(i))
                .map(str::trim)
                .unwrap_or_default();

            let negative = if original.is_empty() {
                info!("Review {} has no negative content to enhance.", number);
                summary.skipped += 1;
                original.to_string()
            } else {
                match self.refine(original).await? {
                    Some(enhanced) => {
                        info!("Review {} negative content enhanced.", number);
                        summary.enhanced += 1;
                        enhanced
                    }
                    None => {
                        warn!("Review {} negative enhancement failed, kept original.", number);
                        summary.kept_original += 1;
                        original.to_string()
                    }
                }
            };

            writer.write_record(&replace_field(row, negative_idx, &negative))?;
            writer.flush()?;
            info!("Review {} written to output.", number);
        }

        Ok(summary)
    }
}

fn replace_field(row: &StringRecord, idx: Option<usize>, value: &str) -> StringRecord {
    row.iter()
        .enumerate()
        .map(|(i, field)| if Some(i) == idx { value } else { field })
        .collect()
}
