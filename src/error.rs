use serde_json::json;
use thiserror::Error;

/// Errors the engine raises to its caller.
///
/// Row-level and subject-level problems never surface here; they are
/// recovered inside the merger and calculator and show up in run statistics.
/// Each variant maps to a stable category string via [`EngineError::code`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{table} is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        table: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("{table} has no rows")]
    EmptyTable { table: String },

    #[error("no roster loaded; load the roster (exam number, name) first")]
    NoRoster,

    #[error("no subject data loaded; load at least one subject file first")]
    NoSubjectData,

    #[error("no processed data: every row was skipped ({skipped} skipped)")]
    NoProcessedData { skipped: usize },

    #[error("{count} examinees exceed the per-run limit of {limit}")]
    TooManyExaminees { count: usize, limit: usize },

    #[error("duplicate subject code {code} for {first} and {second}")]
    DuplicateSubjectCode {
        code: String,
        first: String,
        second: String,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MissingColumns { .. } => "missing_columns",
            EngineError::EmptyTable { .. } => "empty_table",
            EngineError::NoRoster => "no_roster",
            EngineError::NoSubjectData => "no_subject_data",
            EngineError::NoProcessedData { .. } => "no_processed_data",
            EngineError::TooManyExaminees { .. } => "too_many_examinees",
            EngineError::DuplicateSubjectCode { .. } => "duplicate_subject_code",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::MissingColumns {
                table,
                missing,
                available,
            } => Some(json!({
                "table": table,
                "missing": missing,
                "available": available,
            })),
            EngineError::NoProcessedData { skipped } => Some(json!({ "skipped": skipped })),
            EngineError::TooManyExaminees { count, limit } => {
                Some(json!({ "count": count, "limit": limit }))
            }
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
