use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::{EngineConfig, MergeMode};
use crate::error::{EngineError, EngineResult};
use crate::model::{Anomaly, MergeStats, StudentRecord, SubjectResult};
use crate::roster::Roster;
use crate::table::{
    cell_f64, cell_text, identifier_text, is_null_token, resolve_columns, Column, ColumnMap, TableRow,
};

const SUBJECT_COLUMNS: [Column; 5] = [
    Column::SubjectLabel,
    Column::SubjectCode,
    Column::TotalScore,
    Column::CorrectCount,
    Column::WrongAnswers,
];

/// One subject file: the rows for a single subject slot, with its columns
/// checked against the contract at load time.
#[derive(Debug, Clone)]
pub struct SubjectTable {
    subject: String,
    columns: ColumnMap,
    rows: Vec<TableRow>,
}

impl SubjectTable {
    pub fn new(subject: impl Into<String>, rows: Vec<TableRow>, mode: MergeMode) -> EngineResult<Self> {
        let subject = subject.into();
        let key = match mode {
            MergeMode::ByIdentifier => Column::ExamineeId,
            MergeMode::ByName => Column::Name,
        };
        let mut required = vec![key];
        required.extend_from_slice(&SUBJECT_COLUMNS);
        let columns = resolve_columns(&format!("subject file {subject}"), &rows, &required)?;
        Ok(SubjectTable {
            subject,
            columns,
            rows,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingIdentifier,
    NotInRoster,
    BlankName,
    InvalidName,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingIdentifier => "missing_identifier",
            SkipReason::NotInRoster => "not_in_roster",
            SkipReason::BlankName => "blank_name",
            SkipReason::InvalidName => "invalid_name",
        }
    }
}

/// A score or count cell after coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountCell {
    Value(f64),
    Blank,
    Absent,
    Unparsable,
    Negative(f64),
}

impl CountCell {
    pub fn value(self) -> f64 {
        match self {
            CountCell::Value(v) => v,
            _ => 0.0,
        }
    }
}

pub fn read_count(v: Option<&Value>, config: &EngineConfig) -> CountCell {
    let Some(text) = cell_text(v) else {
        return CountCell::Blank;
    };
    if config.is_absentee_token(&text) {
        return CountCell::Absent;
    }
    if is_null_token(&text) {
        return CountCell::Blank;
    }
    match cell_f64(v) {
        Some(f) if f < 0.0 => CountCell::Negative(f),
        // folds -0.0
        Some(f) if f == 0.0 => CountCell::Value(0.0),
        Some(f) => CountCell::Value(f),
        None => CountCell::Unparsable,
    }
}

/// Item numbers from a comma-delimited cell. Tokens that are not plain
/// non-negative integers are dropped; absentee markers give an empty list.
pub fn parse_wrong_answers(v: Option<&Value>, config: &EngineConfig) -> Vec<u32> {
    if let Some(Value::Number(n)) = v {
        let item = n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        });
        return item
            .and_then(|i| u32::try_from(i).ok())
            .into_iter()
            .collect();
    }
    let Some(text) = cell_text(v) else {
        return Vec::new();
    };
    if config.is_absentee_token(&text) || is_null_token(&text) {
        return Vec::new();
    }
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|t| t.parse::<u32>().ok())
        .collect()
}

/// Identifier derived from a display name in by-name merge mode.
pub fn name_identifier(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("STU_{}", joined)
}

/// Builds aggregate records from subject tables.
///
/// One merger per processing run; it owns the records it builds.
pub struct RecordMerger<'a> {
    config: &'a EngineConfig,
    roster: Option<&'a Roster>,
    records: BTreeMap<String, StudentRecord>,
    stats: MergeStats,
}

impl<'a> RecordMerger<'a> {
    pub fn new(config: &'a EngineConfig, roster: Option<&'a Roster>) -> Self {
        RecordMerger {
            config,
            roster,
            records: BTreeMap::new(),
            stats: MergeStats::default(),
        }
    }

    pub fn merge_table(&mut self, table: &SubjectTable) {
        let span = tracing::info_span!("merge_subject", subject = %table.subject);
        let _enter = span.enter();
        let before = (self.stats.processed, self.stats.skipped);

        for (idx, row) in table.rows.iter().enumerate() {
            match self.merge_row(table, idx, row) {
                Ok(()) => self.stats.processed += 1,
                Err(reason) => {
                    self.stats.skipped += 1;
                    *self
                        .stats
                        .skipped_by_reason
                        .entry(reason.as_str().to_string())
                        .or_insert(0) += 1;
                }
            }
        }

        tracing::info!(
            rows = table.rows.len(),
            processed = self.stats.processed - before.0,
            skipped = self.stats.skipped - before.1,
            "subject merged"
        );
    }

    fn resolve_examinee(&self, table: &SubjectTable, idx: usize, row: &TableRow) -> Result<(String, String), SkipReason> {
        let cols = &table.columns;
        let (id, name) = match self.config.merge_mode {
            MergeMode::ByIdentifier => {
                let Some(id) = identifier_text(cols.cell(row, Column::ExamineeId)).filter(|s| !is_null_token(s)) else {
                    tracing::warn!(row = idx, "blank exam number; row skipped");
                    return Err(SkipReason::MissingIdentifier);
                };
                let Some(name) = self.roster.and_then(|r| r.name_of(&id)) else {
                    tracing::warn!(row = idx, examinee = %id, "exam number not in roster; row skipped");
                    return Err(SkipReason::NotInRoster);
                };
                (id, name.trim().to_string())
            }
            MergeMode::ByName => {
                let name = cell_text(cols.cell(row, Column::Name)).unwrap_or_default();
                (name_identifier(&name), name)
            }
        };

        if is_null_token(&name) {
            tracing::warn!(row = idx, examinee = %id, "blank name; row skipped");
            return Err(SkipReason::BlankName);
        }
        if !self.config.name_is_acceptable(&name) {
            tracing::warn!(row = idx, examinee = %id, name = %name, "unusable name; row skipped");
            return Err(SkipReason::InvalidName);
        }
        Ok((id, name))
    }

    fn merge_row(&mut self, table: &SubjectTable, idx: usize, row: &TableRow) -> Result<(), SkipReason> {
        let (id, name) = self.resolve_examinee(table, idx, row)?;
        let cols = &table.columns;
        let mut anomalies: Vec<Anomaly> = Vec::new();

        let score_cell = read_count(cols.cell(row, Column::TotalScore), self.config);
        match score_cell {
            CountCell::Absent => {
                tracing::info!(row = idx, examinee = %id, "absent; scored as 0")
            }
            CountCell::Unparsable => {
                tracing::warn!(row = idx, examinee = %id, "total score is not numeric; scored as 0")
            }
            CountCell::Negative(v) => {
                tracing::warn!(row = idx, examinee = %id, value = v, "negative total score clamped to 0")
            }
            _ => {}
        }
        let total_score = score_cell.value();
        if total_score > self.config.score_anomaly_above {
            tracing::warn!(row = idx, examinee = %id, value = total_score, "total score above expected range");
            anomalies.push(Anomaly::ScoreAboveRange);
        }

        let correct_cell = read_count(cols.cell(row, Column::CorrectCount), self.config);
        if let CountCell::Unparsable = correct_cell {
            tracing::warn!(row = idx, examinee = %id, "correct count is not numeric; counted as 0");
        }
        let correct_count = correct_cell.value();
        if correct_count > self.config.correct_count_anomaly_above {
            tracing::warn!(row = idx, examinee = %id, value = correct_count, "correct count above expected range");
            anomalies.push(Anomaly::CorrectCountAboveRange);
        }

        let wrong_answers = if score_cell == CountCell::Absent {
            Vec::new()
        } else {
            parse_wrong_answers(cols.cell(row, Column::WrongAnswers), self.config)
        };

        let mut result = SubjectResult::observed(
            cell_text(cols.cell(row, Column::SubjectLabel)).unwrap_or_default(),
            cell_text(cols.cell(row, Column::SubjectCode)).unwrap_or_default(),
            total_score,
            correct_count,
            wrong_answers,
        );
        self.stats.anomalies += anomalies.len();
        result.anomalies = anomalies;

        let record = self
            .records
            .entry(id.clone())
            .or_insert_with(|| StudentRecord::new(id, name));
        if record
            .subjects
            .insert(table.subject.clone(), result)
            .is_some()
        {
            tracing::debug!(row = idx, examinee = %record.examinee_id, "repeated row replaces earlier one");
        }
        Ok(())
    }

    /// Hands over the records, failing when no row survived.
    pub fn finish(self) -> EngineResult<(BTreeMap<String, StudentRecord>, MergeStats)> {
        tracing::info!(
            processed = self.stats.processed,
            skipped = self.stats.skipped,
            examinees = self.records.len(),
            "merge finished"
        );
        if self.records.is_empty() {
            return Err(EngineError::NoProcessedData {
                skipped: self.stats.skipped,
            });
        }
        Ok((self.records, self.stats))
    }
}
