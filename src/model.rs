use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::cutoffs::TableOrigin;

/// Out-of-range values that were kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    ScoreAboveRange,
    CorrectCountAboveRange,
}

/// How a subject result's grade, scaled score and percentile were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Derivation {
    /// Merged but not yet graded.
    #[default]
    Pending,
    /// Looked up and interpolated from the cutoff table.
    Computed,
    /// Raw score 0: floor grade without a table lookup.
    ZeroScore,
    /// No cutoff entry for the subject code; raw score only.
    Unmatched,
    /// Calculation failed; floor values were substituted.
    Recovered { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    /// Chosen-subject label as written in the subject file. Display only.
    pub subject_name: String,
    /// Chosen-subject code as written in the subject file.
    pub subject_code: String,
    pub total_score: f64,
    pub correct_count: f64,
    pub wrong_answers: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
    pub grade: Option<u8>,
    pub scaled_score: Option<i64>,
    /// Whole values serialize as integers; fractions only come from a cutoff file.
    #[serde(serialize_with = "whole_as_integer")]
    pub percentile: Option<f64>,
    pub derivation: Derivation,
}

impl SubjectResult {
    pub fn observed(
        subject_name: String,
        subject_code: String,
        total_score: f64,
        correct_count: f64,
        wrong_answers: Vec<u32>,
    ) -> Self {
        SubjectResult {
            subject_name,
            subject_code,
            total_score,
            correct_count,
            wrong_answers,
            anomalies: Vec::new(),
            grade: None,
            scaled_score: None,
            percentile: None,
            derivation: Derivation::Pending,
        }
    }
}

fn whole_as_integer<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => s.serialize_i64(*f as i64),
        Some(f) => s.serialize_f64(*f),
        None => s.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub examinee_id: String,
    pub name: String,
    /// Keyed by subject slot ("Korean", "Math", "Inquiry-1", ...).
    pub subjects: BTreeMap<String, SubjectResult>,
}

impl StudentRecord {
    pub fn new(examinee_id: impl Into<String>, name: impl Into<String>) -> Self {
        StudentRecord {
            examinee_id: examinee_id.into(),
            name: name.into(),
            subjects: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub processed: usize,
    pub skipped: usize,
    pub skipped_by_reason: BTreeMap<String, usize>,
    pub anomalies: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcStats {
    pub computed: usize,
    pub zero_score: usize,
    pub unmatched: usize,
    pub calculation_errors: usize,
}

/// Output of one processing run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub run_id: String,
    pub processed_at: String,
    pub input_digest: String,
    pub cutoff_origin: TableOrigin,
    pub merge: MergeStats,
    pub calc: CalcStats,
    pub records: BTreeMap<String, StudentRecord>,
}
