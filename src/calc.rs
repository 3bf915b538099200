use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PercentileSource;
use crate::cutoffs::{CutoffEntry, CutoffTable, GRADE_COUNT};
use crate::model::{CalcStats, Derivation, StudentRecord, SubjectResult};
use crate::subjects::SubjectRegistry;

const FLOOR_GRADE: u8 = GRADE_COUNT as u8;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CalcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

/// Coarse percentile band for a grade.
pub fn percentile_for_grade(grade: u8) -> f64 {
    match grade {
        1 => 95.0,
        2 => 85.0,
        3 => 75.0,
        4 => 65.0,
        5 => 55.0,
        6 => 45.0,
        7 => 35.0,
        8 => 25.0,
        9 => 15.0,
        _ => 50.0,
    }
}

/// First grade (1 = best) whose cutoff `score` meets.
pub fn grade_for_score(score: f64, thresholds: &[f64; GRADE_COUNT]) -> u8 {
    for (i, cut) in thresholds.iter().enumerate() {
        if score >= *cut {
            return (i + 1) as u8;
        }
    }
    FLOOR_GRADE
}

/// Scaled score for `score` inside `grade`, interpolated toward the next
/// better grade's anchor by the score's position between the two cutoffs.
pub fn scaled_score(score: f64, grade: u8, entry: &CutoffEntry) -> Result<i64, CalcError> {
    let missing = |what: &str, g: u8| {
        CalcError::new(
            "missing_anchor",
            format!("{}: no {what} for grade {g}", entry.subject_name),
        )
    };
    let anchor = entry.anchor(grade).ok_or_else(|| missing("anchor", grade))?;

    let value = if grade <= 1 {
        anchor
    } else {
        let floor = entry.threshold(grade).ok_or_else(|| missing("cutoff", grade))?;
        let ceiling = entry
            .threshold(grade - 1)
            .ok_or_else(|| missing("cutoff", grade - 1))?;
        let better = entry
            .anchor(grade - 1)
            .ok_or_else(|| missing("anchor", grade - 1))?;
        if ceiling == floor {
            anchor
        } else {
            let ratio = ((score - floor) / (ceiling - floor)).clamp(0.0, 1.0);
            anchor + (better - anchor) * ratio
        }
    };

    if !value.is_finite() {
        return Err(CalcError::new(
            "interpolation_failed",
            format!("{}: scaled score for {score} is not finite", entry.subject_name),
        ));
    }
    Ok(value.trunc() as i64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub grade: Option<u8>,
    pub scaled_score: Option<i64>,
    pub percentile: Option<f64>,
    pub derivation: Derivation,
}

impl Computation {
    fn floor(derivation: Derivation) -> Self {
        Computation {
            grade: Some(FLOOR_GRADE),
            scaled_score: Some(0),
            percentile: Some(0.0),
            derivation,
        }
    }
}

/// Derives grade, scaled score and percentile from a subject's raw score.
///
/// Reads the registry and cutoff table only; both can be shared across runs.
pub struct GradeCalculator<'a> {
    registry: &'a SubjectRegistry,
    cutoffs: &'a CutoffTable,
    percentile_source: PercentileSource,
}

impl<'a> GradeCalculator<'a> {
    pub fn new(
        registry: &'a SubjectRegistry,
        cutoffs: &'a CutoffTable,
        percentile_source: PercentileSource,
    ) -> Self {
        GradeCalculator {
            registry,
            cutoffs,
            percentile_source,
        }
    }

    pub fn compute(&self, subject: &SubjectResult) -> Result<Computation, CalcError> {
        let score = subject.total_score;
        if !score.is_finite() {
            return Err(CalcError::new(
                "non_finite_score",
                format!("total score {score} is not a finite number"),
            ));
        }
        // Absent and genuinely zero scores are indistinguishable here.
        if score == 0.0 {
            return Ok(Computation::floor(Derivation::ZeroScore));
        }

        let entry = self
            .registry
            .resolve(&subject.subject_code, self.cutoffs)
            .and_then(|name| self.cutoffs.get(name));
        let Some(entry) = entry else {
            return Ok(Computation {
                grade: None,
                scaled_score: None,
                percentile: None,
                derivation: Derivation::Unmatched,
            });
        };

        let grade = grade_for_score(score, &entry.thresholds);
        if !entry.is_scaled() {
            return Ok(Computation {
                grade: Some(grade),
                scaled_score: None,
                percentile: None,
                derivation: Derivation::Computed,
            });
        }

        let scaled = scaled_score(score, grade, entry)?;
        let percentile = match self.percentile_source {
            PercentileSource::GradeBand => percentile_for_grade(grade),
            PercentileSource::CutoffTable => entry
                .percentile(grade)
                .unwrap_or_else(|| percentile_for_grade(grade)),
        };
        Ok(Computation {
            grade: Some(grade),
            scaled_score: Some(scaled),
            percentile: Some(percentile),
            derivation: Derivation::Computed,
        })
    }

    /// Fills in one subject result. A calculation error falls back to the
    /// floor grade with zero scaled score and percentile.
    pub fn apply(&self, subject: &mut SubjectResult, stats: &mut CalcStats) {
        let c = match self.compute(subject) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(code = %e.code, error = %e.message, "grade calculation failed; using floor values");
                stats.calculation_errors += 1;
                Computation::floor(Derivation::Recovered { reason: e.to_string() })
            }
        };
        match c.derivation {
            Derivation::Computed => stats.computed += 1,
            Derivation::ZeroScore => stats.zero_score += 1,
            Derivation::Unmatched => stats.unmatched += 1,
            _ => {}
        }
        subject.grade = c.grade;
        subject.scaled_score = c.scaled_score;
        subject.percentile = c.percentile;
        subject.derivation = c.derivation;
    }

    pub fn grade_records(&self, records: &mut BTreeMap<String, StudentRecord>) -> CalcStats {
        let mut stats = CalcStats::default();
        for (id, record) in records.iter_mut() {
            for (slot, subject) in record.subjects.iter_mut() {
                let span = tracing::debug_span!("grade", examinee = %id, subject = %slot);
                let _enter = span.enter();
                self.apply(subject, &mut stats);
            }
        }
        if stats.calculation_errors > 0 {
            tracing::warn!(
                errors = stats.calculation_errors,
                "some grade calculations fell back to floor values"
            );
        }
        stats
    }
}
