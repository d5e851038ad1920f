//! Splitting a project's sentiment phrases into sets for generation.
//!
//! Two strategies are available and neither is implied by the other:
//!
//! - [`PartitionStrategy::FixedCount`] splits each sentiment pool into a fixed
//!   number of near-equal chunks (or a single set for small projects).
//! - [`PartitionStrategy::Exhaustive`] keeps drawing bounded random sets until
//!   both pools are used up, so the set count depends on pool sizes.

use std::collections::HashMap;

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::schema::{PhraseRecord, PhraseSet, Sentiment};

/// Sets used by the deployed fixed-count configuration.
pub const DEFAULT_NUM_SETS: usize = 4;
/// Projects with fewer phrases than this are not split.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 40;
/// Per-sentiment cap for each exhaustive set.
pub const DEFAULT_PHRASES_PER_SET: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub project_id: String,
    pub project_name: String,
}

#[derive(Debug, Clone)]
pub struct ProjectPhraseGroup {
    pub key: ProjectKey,
    pub positive_phrases: Vec<String>,
    pub negative_phrases: Vec<String>,
    /// Last recorded duration wins when a phrase repeats.
    pub durations: HashMap<String, u32>,
}

impl ProjectPhraseGroup {
    fn new(key: ProjectKey) -> Self {
        Self {
            key,
            positive_phrases: Vec::new(),
            negative_phrases: Vec::new(),
            durations: HashMap::new(),
        }
    }

    pub fn total_phrases(&self) -> usize {
        self.positive_phrases.len() + self.negative_phrases.len()
    }

    fn build_set(&self, positives: &[String], negatives: &[String]) -> PhraseSet {
        let formatted: Vec<String> = positives
            .iter()
            .map(|p| format_token(p, Sentiment::Positive))
            .chain(negatives.iter().map(|n| format_token(n, Sentiment::Negative)))
            .collect();

        let durations: Vec<u32> = positives
            .iter()
            .chain(negatives.iter())
            .map(|p| self.durations.get(p).copied().unwrap_or(0))
            .collect();

        PhraseSet {
            formatted_phrases: formatted.join("; "),
            avg_duration: format_duration(&durations),
            positive_count: positives.len(),
            negative_count: negatives.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartitionedProject {
    pub key: ProjectKey,
    pub sets: Vec<PhraseSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStrategy {
    FixedCount {
        num_sets: usize,
        split_threshold: usize,
    },
    Exhaustive {
        phrases_per_set: usize,
    },
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        Self::fixed_count()
    }
}

impl PartitionStrategy {
    pub fn fixed_count() -> Self {
        PartitionStrategy::FixedCount {
            num_sets: DEFAULT_NUM_SETS,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
        }
    }

    pub fn exhaustive() -> Self {
        PartitionStrategy::Exhaustive {
            phrases_per_set: DEFAULT_PHRASES_PER_SET,
        }
    }

    pub fn partition<R: Rng + ?Sized>(
        &self,
        group: &ProjectPhraseGroup,
        rng: &mut R,
    ) -> Vec<PhraseSet> {
        match self {
            PartitionStrategy::FixedCount {
                num_sets,
                split_threshold,
            } => {
                if group.total_phrases() < *split_threshold || *num_sets <= 1 {
                    vec![group.build_set(&group.positive_phrases, &group.negative_phrases)]
                } else {
                    split_equally(group, *num_sets, rng)
                }
            }
            PartitionStrategy::Exhaustive { phrases_per_set } => {
                draw_exhaustively(group, (*phrases_per_set).max(1), rng)
            }
        }
    }

    /// Number of `Set i` column pairs the output table needs.
    pub fn column_count(&self, projects: &[PartitionedProject]) -> usize {
        match self {
            PartitionStrategy::FixedCount { num_sets, .. } => (*num_sets).max(1),
            PartitionStrategy::Exhaustive { .. } => projects
                .iter()
                .map(|project| project.sets.len())
                .max()
                .unwrap_or(0),
        }
    }
}

/// Groups records by `(project_id, project_name)` in first-appearance order.
pub fn group_by_project(records: &[PhraseRecord]) -> Vec<ProjectPhraseGroup> {
    let mut groups: Vec<ProjectPhraseGroup> = Vec::new();
    let mut index: HashMap<ProjectKey, usize> = HashMap::new();

    for record in records {
        let key = ProjectKey {
            project_id: record.project_id.clone(),
            project_name: record.project_name.clone(),
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(ProjectPhraseGroup::new(key));
            groups.len() - 1
        });
        let group = &mut groups[slot];

        match record.sentiment {
            Sentiment::Positive => group.positive_phrases.push(record.phrase_text.clone()),
            Sentiment::Negative => group.negative_phrases.push(record.phrase_text.clone()),
            Sentiment::Neutral => {}
        }
        group
            .durations
            .insert(record.phrase_text.clone(), record.stay_duration_years);
    }

    groups
}

pub fn partition_projects<R: Rng + ?Sized>(
    groups: &[ProjectPhraseGroup],
    strategy: &PartitionStrategy,
    rng: &mut R,
) -> Vec<PartitionedProject> {
    groups
        .iter()
        .map(|group| {
            info!(
                "{} - {}: {} positives, {} negatives, {} total",
                group.key.project_id,
                group.key.project_name,
                group.positive_phrases.len(),
                group.negative_phrases.len(),
                group.total_phrases()
            );

            let sets = strategy.partition(group, rng);
            for (i, set) in sets.iter().enumerate() {
                info!(
                    "    Set {}: {} positives, {} negatives",
                    i + 1,
                    set.positive_count,
                    set.negative_count
                );
            }

            PartitionedProject {
                key: group.key.clone(),
                sets,
            }
        })
        .collect()
}

fn split_equally<R: Rng + ?Sized>(
    group: &ProjectPhraseGroup,
    num_sets: usize,
    rng: &mut R,
) -> Vec<PhraseSet> {
    debug!(
        "Distributing {} across {} sets",
        group.key.project_name, num_sets
    );

    let mut positives = group.positive_phrases.clone();
    let mut negatives = group.negative_phrases.clone();
    positives.shuffle(rng);
    negatives.shuffle(rng);

    let pos_chunks = chunk_bounds(positives.len(), num_sets);
    let neg_chunks = chunk_bounds(negatives.len(), num_sets);

    pos_chunks
        .into_iter()
        .zip(neg_chunks)
        .map(|(pos, neg)| group.build_set(&positives[pos.0..pos.1], &negatives[neg.0..neg.1]))
        .filter(|set| !set.is_empty())
        .collect()
}

/// `(start, end)` ranges that cut `len` items into `parts` chunks whose sizes
/// differ by at most one, the first `len % parts` chunks taking the extra item.
fn chunk_bounds(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let base = len / parts;
    let remainder = len % parts;
    let mut start = 0;

    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < remainder);
            let bounds = (start, start + size);
            start += size;
            bounds
        })
        .collect()
}

fn draw_exhaustively<R: Rng + ?Sized>(
    group: &ProjectPhraseGroup,
    per_set: usize,
    rng: &mut R,
) -> Vec<PhraseSet> {
    // Shuffling once and taking consecutive runs is a uniform draw without
    // replacement across the whole project.
    let mut positives = group.positive_phrases.clone();
    let mut negatives = group.negative_phrases.clone();
    positives.shuffle(rng);
    negatives.shuffle(rng);

    let mut pos_iter = positives.chunks(per_set);
    let mut neg_iter = negatives.chunks(per_set);
    let mut sets = Vec::new();

    loop {
        let pos = pos_iter.next().unwrap_or(&[]);
        let neg = neg_iter.next().unwrap_or(&[]);
        if pos.is_empty() && neg.is_empty() {
            break;
        }
        sets.push(group.build_set(pos, neg));
    }

    sets
}

pub fn format_token(phrase: &str, sentiment: Sentiment) -> String {
    format!("{} ({})", phrase, sentiment.tag())
}

/// Mean of the durations as `"<x.x> Years"`, `"0.0 Years"` when empty.
pub fn format_duration(durations: &[u32]) -> String {
    let avg = if durations.is_empty() {
        0.0
    } else {
        durations.iter().map(|&d| f64::from(d)).sum::<f64>() / durations.len() as f64
    };
    format!("{:.1} Years", avg)
}
