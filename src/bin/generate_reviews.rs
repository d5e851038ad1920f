use std::path::Path;
use std::process::ExitCode;

use log::{error, info};
use society_review_builder::llm::{GeminiClient, PromptLibrary, ReviewSynthesizer};
use society_review_builder::{
    init_logging, persona_from_env, read_set_table, synthesis_mode_from_env, GenerationSettings,
    Result, ReviewTableWriter, DEFAULT_PROMPT_FILE,
};

const INPUT_FILE: &str = "output_sets.csv";
const OUTPUT_FILE: &str = "gemini_structured_reviews.csv";

async fn run() -> Result<()> {
    // Configuration problems surface before any request is sent.
    let client = GeminiClient::from_env()?;
    let mode = synthesis_mode_from_env()?;
    let persona = persona_from_env()?;
    let prompts = PromptLibrary::from_file(Path::new(DEFAULT_PROMPT_FILE))?;
    let system_instruction = prompts.for_persona(persona)?;
    let settings = GenerationSettings::for_synthesis().with_env_overrides();

    let table = read_set_table(Path::new(INPUT_FILE))?;
    info!(
        "Loaded {} projects from {} with {} set columns ({:?}, persona {:?})",
        table.rows.len(),
        INPUT_FILE,
        table.set_count,
        mode,
        persona
    );

    let mut writer = ReviewTableWriter::create(Path::new(OUTPUT_FILE), table.set_count)?;
    let mut synthesizer = ReviewSynthesizer::new(&client, system_instruction, &settings, mode)?;
    let summary = synthesizer.run(&table, &mut writer).await?;

    info!(
        "All done! Generated reviews saved to {}: {} projects, {} reviews, {} failed, {} empty sets",
        OUTPUT_FILE, summary.projects, summary.generated, summary.failed, summary.skipped
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
