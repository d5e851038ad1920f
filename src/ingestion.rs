use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;

use crate::error::{ReviewBuilderError, Result};
use crate::partition::PartitionedProject;
use crate::schema::{PhraseRecord, Sentiment};

pub const XID_COLUMN: &str = "xid";
pub const PROJECT_NAME_COLUMN: &str = "Project name";
const SET_PREFIX: &str = "Set ";
const DURATION_PREFIX: &str = "How Long do you stay here ";

#[derive(Debug, Deserialize)]
struct PhraseRow {
    xid: String,
    #[serde(rename = "Project name")]
    project_name: String,
    #[serde(rename = "Phrase")]
    phrase: String,
    #[serde(rename = "Sentiment", default)]
    sentiment: String,
    #[serde(rename = "How Long do you stay here", default)]
    stay: String,
}

fn years_pattern() -> Option<&'static Regex> {
    static YEARS: OnceLock<Option<Regex>> = OnceLock::new();
    YEARS.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// First run of digits in `text`, `0` when there is none or it overflows.
pub fn extract_years(text: &str) -> u32 {
    let Some(digits) = years_pattern().and_then(|re| re.find(text)) else {
        return 0;
    };
    match digits.as_str().parse() {
        Ok(years) => years,
        Err(e) => {
            warn!("Ignoring stay duration '{}': {}", text, e);
            0
        }
    }
}

fn open_input(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(ReviewBuilderError::InputNotFound(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

pub fn read_phrase_records(path: &Path) -> Result<Vec<PhraseRecord>> {
    let mut reader = ReaderBuilder::new().from_reader(open_input(path)?);
    let mut records = Vec::new();

    for row in reader.deserialize::<PhraseRow>() {
        let row = row?;
        records.push(PhraseRecord {
            project_id: row.xid,
            project_name: row.project_name,
            phrase_text: row.phrase,
            sentiment: Sentiment::from_label(&row.sentiment),
            stay_duration_years: extract_years(&row.stay),
        });
    }

    debug!("Read {} phrase rows from {}", records.len(), path.display());
    Ok(records)
}

pub fn set_table_headers(set_count: usize) -> Vec<String> {
    let mut headers = vec![XID_COLUMN.to_string(), PROJECT_NAME_COLUMN.to_string()];
    for i in 1..=set_count {
        headers.push(format!("{}{}", SET_PREFIX, i));
        headers.push(format!("{}{}", DURATION_PREFIX, i));
    }
    headers
}

/// Writes one row per project, padding projects with fewer sets than
/// `set_count` with empty cells.
pub fn write_set_table(path: &Path, projects: &[PartitionedProject], set_count: usize) -> Result<()> {
    let headers = set_table_headers(set_count);
    let mut writer = Writer::from_path(path)?;
    writer.write_record(&headers)?;

    for project in projects {
        let mut row = vec![
            project.key.project_id.clone(),
            project.key.project_name.clone(),
        ];
        for set in project.sets.iter().take(set_count) {
            row.push(set.formatted_phrases.clone());
            row.push(set.avg_duration.clone());
        }
        row.resize(headers.len(), String::new());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// One set cell pair from the partitioned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCell {
    /// Number taken from the `Set <n>` header.
    pub number: usize,
    pub phrases: String,
    /// `None` when the table has no duration column for this set.
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTableRow {
    pub xid: String,
    pub project_name: String,
    /// One slot per set column in header-number order; `None` for empty cells.
    pub sets: Vec<Option<SetCell>>,
}

#[derive(Debug, Clone, Default)]
pub struct SetTable {
    pub set_count: usize,
    pub rows: Vec<SetTableRow>,
}

pub fn read_set_table(path: &Path) -> Result<SetTable> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(open_input(path)?);
    let headers = reader.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let xid_idx = column(XID_COLUMN);
    let name_idx = column(PROJECT_NAME_COLUMN);

    // (set number, phrases column, duration column)
    let mut set_columns: Vec<(usize, usize, Option<usize>)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            let number: usize = header.strip_prefix(SET_PREFIX)?.trim().parse().ok()?;
            let duration_idx = column(format!("{}{}", DURATION_PREFIX, number).as_str());
            Some((number, idx, duration_idx))
        })
        .collect();
    set_columns.sort_by_key(|(number, _, _)| *number);
    let set_count = set_columns.len();
    debug!("Found {} set columns in {}", set_count, path.display());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let sets = set_columns
            .iter()
            .map(|(number, phrases_idx, duration_idx)| {
                let phrases = cell(Some(*phrases_idx));
                if phrases.is_empty() {
                    return None;
                }
                Some(SetCell {
                    number: *number,
                    phrases,
                    duration: duration_idx.map(|idx| cell(Some(idx))),
                })
            })
            .collect();

        rows.push(SetTableRow {
            xid: cell(xid_idx),
            project_name: cell(name_idx),
            sets,
        });
    }

    Ok(SetTable { set_count, rows })
}

/// Review table writer that flushes after every project row.
pub struct ReviewTableWriter {
    writer: Writer<File>,
    review_count: usize,
}

impl ReviewTableWriter {
    pub fn create(path: &Path, review_count: usize) -> Result<Self> {
        let mut writer = WriterBuilder::new().from_path(path)?;
        let mut headers = vec![XID_COLUMN.to_string(), PROJECT_NAME_COLUMN.to_string()];
        headers.extend((1..=review_count).map(|i| format!("Review {}", i)));
        writer.write_record(&headers)?;
        writer.flush()?;
        Ok(Self {
            writer,
            review_count,
        })
    }

    pub fn write_row(&mut self, xid: &str, project_name: &str, reviews: &[String]) -> Result<()> {
        let mut row = vec![xid.to_string(), project_name.to_string()];
        row.extend(reviews.iter().take(self.review_count).cloned());
        row.resize(self.review_count + 2, String::new());
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A CSV table kept as raw records, for passes that rewrite one column.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(open_input(path)?);
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Opens `path` for output and writes this table's header row.
    pub fn create_writer(&self, path: &Path) -> Result<Writer<File>> {
        let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record(&self.headers)?;
        writer.flush()?;
        Ok(writer)
    }
}
