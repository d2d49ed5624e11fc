use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a ranking call had nothing to rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyCorpus {
    NoRecords,
    MissingDescription,
}

impl fmt::Display for EmptyCorpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyCorpus::NoRecords => f.write_str("no CV records"),
            EmptyCorpus::MissingDescription => f.write_str("job description is empty"),
        }
    }
}

/// The only conditions the ranking path surfaces to its callers.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Corpus empty for job offer {job_offer_id}: {reason}")]
    CorpusEmpty {
        job_offer_id: i64,
        reason: EmptyCorpus,
    },

    #[error("topN must be between 1 and {max}, got {requested}")]
    InvalidTopN { requested: usize, max: usize },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not read record store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A malformed flat-store row. Always recovered: the row is skipped.
#[derive(Debug, Error, PartialEq)]
pub enum RecordParseError {
    #[error("row has {found} fields, expected at least {expected}")]
    TooFewFields { found: usize, expected: usize },

    #[error("field '{field}' is not an integer: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("extracted_at is not an ISO-8601 local date-time: '{value}'")]
    InvalidTimestamp { value: String },
}

/// Failure of one external stage invocation.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage '{stage}' could not be started: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage '{stage}' timed out after {}s and was killed", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    #[error("Stage '{stage}' exited with {}", exit_label(.code))]
    Exit {
        stage: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Stage '{stage}' I/O error: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// A single stage-output field that could not be read. Degrades to "absent".
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("field '{field}' is not numeric: '{raw}'")]
    NotNumeric { field: String, raw: String },

    #[error("field '{field}' is not a string: '{raw}'")]
    NotText { field: String, raw: String },

    #[error("field '{field}' has an unterminated string value")]
    Unterminated { field: String },

    #[error("section '{section}' is never closed")]
    SectionNotClosed { section: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Why one record left the pipeline in the FAILED state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not prepare scratch files: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Stage '{stage}' reported success but its output {path} is unreadable: {source}")]
    MissingOutput {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not persist score: {0}")]
    Persistence(#[from] PersistenceError),
}
