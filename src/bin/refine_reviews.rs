use std::path::Path;
use std::process::ExitCode;

use log::{error, info};
use society_review_builder::llm::{GeminiClient, NegativeReviewRefiner};
use society_review_builder::{init_logging, GenerationSettings, Result};

const INPUT_FILE: &str = "processed_reviews.csv";
const OUTPUT_FILE: &str = "enhanced_reviews.csv";

async fn run() -> Result<()> {
    let client = GeminiClient::from_env()?;
    let settings = GenerationSettings::for_refinement().with_env_overrides();

    let mut refiner = NegativeReviewRefiner::new(&client, &settings);
    let summary = refiner
        .run(Path::new(INPUT_FILE), Path::new(OUTPUT_FILE))
        .await?;

    info!(
        "Wrote {} reviews to {}: {} enhanced, {} kept original, {} without negative text",
        summary.rows, OUTPUT_FILE, summary.enhanced, summary.kept_original, summary.skipped
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
