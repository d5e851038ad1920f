use std::path::Path;
use std::process::ExitCode;

use log::{error, info};
use rand::thread_rng;
use society_review_builder::{
    group_by_project, init_logging, partition_projects, partition_strategy_from_env,
    read_phrase_records, write_set_table, Result,
};

const INPUT_FILE: &str = "phrases.csv";
const OUTPUT_FILE: &str = "output_sets.csv";

fn run() -> Result<()> {
    let strategy = partition_strategy_from_env()?;
    let records = read_phrase_records(Path::new(INPUT_FILE))?;
    let groups = group_by_project(&records);
    info!(
        "Loaded {} phrases across {} projects, strategy {:?}",
        records.len(),
        groups.len(),
        strategy
    );

    let projects = partition_projects(&groups, &strategy, &mut thread_rng());
    let columns = strategy.column_count(&projects);
    write_set_table(Path::new(OUTPUT_FILE), &projects, columns)?;

    info!("Output saved to {} ({} set columns)", OUTPUT_FILE, columns);
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
