//! # Society Review Builder
//!
//! Batch tooling that turns sentiment phrases collected for housing societies
//! into synthetic structured reviews with the Gemini API.
//!
//! ## Pipelines
//!
//! - **Partitioner**: groups phrase rows per project and buckets each
//!   project's positive and negative phrases into sets, tagging every set
//!   with the mean stay duration ([`partition`]).
//! - **Review Synthesizer**: sends one request per project set, constrained
//!   to the [`ReviewResult`] schema, and normalizes the reply
//!   ([`llm::ReviewSynthesizer`], [`normalize`]).
//! - **Refiner**: optionally rewrites the negative text of finished reviews
//!   ([`llm::NegativeReviewRefiner`]).
//!
//! All calls go through [`llm::RequestDriver`], which applies the per-minute
//! and per-day limits, quota backoff and pacing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rand::thread_rng;
//! use society_review_builder::*;
//! use std::path::Path;
//!
//! let records = read_phrase_records(Path::new("phrases.csv"))?;
//! let groups = group_by_project(&records);
//! let strategy = PartitionStrategy::fixed_count();
//! let projects = partition_projects(&groups, &strategy, &mut thread_rng());
//! write_set_table(
//!     Path::new("output_sets.csv"),
//!     &projects,
//!     strategy.column_count(&projects),
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod normalize;
pub mod partition;
pub mod schema;

pub use config::*;
pub use error::{ReviewBuilderError, Result};
pub use ingestion::*;
pub use normalize::{normalize_fields, normalize_reply};
pub use partition::*;
pub use schema::*;

/// Installs the console log subscriber used by the batch binaries.
///
/// `RUST_LOG` overrides the default `info` level. Records emitted through the
/// `log` facade are captured as well.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
