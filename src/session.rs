//! Per-run state and the merge + grade pipeline.
//!
//! A session owns everything mutable about a processing run (config, roster,
//! subject tables, uploaded cutoff table, last result). The subject registry
//! and the generated default cutoff table are shared read-only.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::calc::GradeCalculator;
use crate::config::{EngineConfig, MergeMode};
use crate::cutoffs::{CutoffTable, Rejection, TableOrigin};
use crate::error::{EngineError, EngineResult};
use crate::merge::{RecordMerger, SubjectTable};
use crate::model::ResultSet;
use crate::roster::Roster;
use crate::subjects::{normalize_code, SubjectRegistry};
use crate::table::TableRow;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffLoadSummary {
    pub loaded: Vec<String>,
    pub rejected: Vec<Rejection>,
    /// Loaded subjects that no catalogue code resolves to.
    pub unreachable: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorLoadSummary {
    pub applied: Vec<String>,
    pub rejected: Vec<Rejection>,
}

pub struct Session {
    config: EngineConfig,
    registry: Arc<SubjectRegistry>,
    default_cutoffs: Arc<CutoffTable>,
    roster: Option<Roster>,
    subjects: Vec<SubjectTable>,
    cutoffs: Option<Arc<CutoffTable>>,
    last: Option<ResultSet>,
}

impl Session {
    pub fn new(config: EngineConfig, registry: Arc<SubjectRegistry>) -> Self {
        let default_cutoffs = Arc::new(CutoffTable::default_table(&registry));
        Session {
            config,
            registry,
            default_cutoffs,
            roster: None,
            subjects: Vec::new(),
            cutoffs: None,
            last: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    /// Applies a partial config. Switching merge mode drops loaded subject
    /// files, since their key column differs per mode. Returns whether it did.
    pub fn configure(&mut self, patch: &serde_json::Value) -> Result<bool, serde_json::Error> {
        let next = self.config.patched(patch)?;
        let cleared = next.merge_mode != self.config.merge_mode && !self.subjects.is_empty();
        if cleared {
            tracing::warn!(
                subjects = self.subjects.len(),
                "merge mode changed; loaded subject files dropped"
            );
            self.subjects.clear();
        }
        self.config = next;
        Ok(cleared)
    }

    pub fn reset(&mut self) {
        self.roster = None;
        self.subjects.clear();
        self.cutoffs = None;
        self.last = None;
    }

    pub fn load_roster(&mut self, rows: &[TableRow]) -> EngineResult<usize> {
        let roster = Roster::from_rows(rows)?;
        let n = roster.len();
        tracing::info!(entries = n, "roster loaded");
        self.roster = Some(roster);
        Ok(n)
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    /// Loads one subject file, replacing any earlier file for the same slot.
    pub fn load_subject(&mut self, subject: &str, rows: Vec<TableRow>) -> EngineResult<usize> {
        let table = SubjectTable::new(subject.trim(), rows, self.config.merge_mode)?;
        let n = table.len();
        match self.subjects.iter_mut().find(|t| t.subject() == table.subject()) {
            Some(slot) => {
                tracing::info!(subject = %table.subject(), rows = n, "subject file replaced");
                *slot = table;
            }
            None => {
                tracing::info!(subject = %table.subject(), rows = n, "subject file loaded");
                self.subjects.push(table);
            }
        }
        Ok(n)
    }

    pub fn subjects(&self) -> &[SubjectTable] {
        &self.subjects
    }

    pub fn load_cutoffs(&mut self, rows: &[TableRow]) -> EngineResult<CutoffLoadSummary> {
        let load = CutoffTable::load(rows)?;
        let mut unreachable = Vec::new();
        for e in load.table.entries() {
            match self.registry.code_for(&e.subject_name) {
                None => {
                    tracing::warn!(subject = %e.subject_name, "subject not in catalogue; no code will match it");
                    unreachable.push(e.subject_name.clone());
                }
                Some(code) => {
                    if let Some(file_code) = e.subject_code.as_deref() {
                        if normalize_code(file_code) != code {
                            tracing::warn!(
                                subject = %e.subject_name,
                                file_code = %file_code,
                                catalogue_code = %code,
                                "cutoff file code differs from catalogue; catalogue code is used"
                            );
                        }
                    }
                }
            }
        }
        if load.table.is_empty() {
            tracing::warn!("cutoff file has no usable rows; every subject will be unmatched");
        }
        for r in &load.rejected {
            tracing::warn!(row = r.row, subject = %r.subject, reason = %r.reason, "cutoff row rejected");
        }
        let summary = CutoffLoadSummary {
            loaded: load.table.entries().map(|e| e.subject_name.clone()).collect(),
            rejected: load.rejected,
            unreachable,
        };
        tracing::info!(
            loaded = summary.loaded.len(),
            rejected = summary.rejected.len(),
            "cutoff table loaded"
        );
        self.cutoffs = Some(Arc::new(load.table));
        Ok(summary)
    }

    /// Overlays scaled-score anchors on the active cutoff table. The result
    /// stays active until the next cutoff load or default reset.
    pub fn load_anchors(&mut self, rows: &[TableRow]) -> EngineResult<AnchorLoadSummary> {
        let overlay = self.cutoffs().with_anchors(rows)?;
        for r in &overlay.rejected {
            tracing::warn!(row = r.row, subject = %r.subject, reason = %r.reason, "scaled-score row rejected");
        }
        tracing::info!(
            applied = overlay.applied.len(),
            rejected = overlay.rejected.len(),
            "scaled scores applied"
        );
        self.cutoffs = Some(Arc::new(overlay.table));
        Ok(AnchorLoadSummary {
            applied: overlay.applied,
            rejected: overlay.rejected,
        })
    }

    pub fn cutoff_template(&self) -> Vec<TableRow> {
        CutoffTable::template_rows(&self.registry)
    }

    pub fn use_default_cutoffs(&mut self) -> usize {
        self.cutoffs = None;
        self.default_cutoffs.len()
    }

    /// The uploaded cutoff table, or the generated one when none was given.
    pub fn cutoffs(&self) -> Arc<CutoffTable> {
        match &self.cutoffs {
            Some(t) => Arc::clone(t),
            None => Arc::clone(&self.default_cutoffs),
        }
    }

    /// Merges every loaded subject file and grades the result.
    pub fn process(&mut self) -> EngineResult<&ResultSet> {
        let span = tracing::info_span!("process");
        let _enter = span.enter();

        if self.config.merge_mode == MergeMode::ByIdentifier
            && self.roster.as_ref().map(|r| r.is_empty()).unwrap_or(true)
        {
            return Err(EngineError::NoRoster);
        }
        if self.subjects.is_empty() {
            return Err(EngineError::NoSubjectData);
        }

        let cutoffs = self.cutoffs();
        if cutoffs.origin() != TableOrigin::Loaded {
            tracing::warn!("no cutoff table loaded; using generated default cutoffs");
        }

        let mut merger = RecordMerger::new(&self.config, self.roster.as_ref());
        for table in &self.subjects {
            merger.merge_table(table);
        }
        let (mut records, merge) = merger.finish()?;

        if records.len() > self.config.max_examinees {
            return Err(EngineError::TooManyExaminees {
                count: records.len(),
                limit: self.config.max_examinees,
            });
        }

        let calculator = GradeCalculator::new(&self.registry, &cutoffs, self.config.percentile_source);
        let calc = calculator.grade_records(&mut records);

        let result = ResultSet {
            run_id: Uuid::new_v4().to_string(),
            processed_at: chrono::Utc::now().to_rfc3339(),
            input_digest: self.input_digest(&cutoffs),
            cutoff_origin: cutoffs.origin(),
            merge,
            calc,
            records,
        };
        tracing::info!(
            run_id = %result.run_id,
            examinees = result.records.len(),
            calculation_errors = result.calc.calculation_errors,
            "processing finished"
        );
        Ok(&*self.last.insert(result))
    }

    pub fn last_result(&self) -> Option<&ResultSet> {
        self.last.as_ref()
    }

    /// SHA-256 over everything that determines a run's records.
    fn input_digest(&self, cutoffs: &CutoffTable) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.config).unwrap_or_default());
        if let Some(roster) = &self.roster {
            for (id, name) in roster.iter() {
                hasher.update(id.as_bytes());
                hasher.update([0u8]);
                hasher.update(name.as_bytes());
                hasher.update([0u8]);
            }
        }
        for t in &self.subjects {
            hasher.update(t.subject().as_bytes());
            hasher.update(serde_json::to_vec(t.rows()).unwrap_or_default());
        }
        for e in cutoffs.entries() {
            hasher.update(serde_json::to_vec(e).unwrap_or_default());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Derivation;
    use serde_json::json;

    fn rows(v: serde_json::Value) -> Vec<TableRow> {
        v.as_array()
            .expect("array")
            .iter()
            .map(|r| r.as_object().cloned().expect("object"))
            .collect()
    }

    fn session() -> Session {
        Session::new(EngineConfig::default(), Arc::new(SubjectRegistry::builtin()))
    }

    fn kim_roster(s: &mut Session) {
        s.load_roster(&rows(json!([{ "examinee_identifier": "1001", "name": "Kim" }])))
            .expect("roster");
    }

    fn math_rows(score: serde_json::Value) -> Vec<TableRow> {
        rows(json!([{
            "examinee_identifier": 1001,
            "chosen_subject_label": "수학",
            "chosen_subject_code": "02",
            "total_score": score,
            "correct_count": 22,
            "wrong_answer_numbers": "5,8,15"
        }]))
    }

    #[test]
    fn kim_scenario_with_default_table() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!(88))).expect("subject");
        let result = s.process().expect("process");
        assert_eq!(result.cutoff_origin, TableOrigin::Generated);
        let rec = &result.records["1001"];
        assert_eq!(rec.name, "Kim");
        let math = &rec.subjects["Math"];
        assert_eq!(math.grade, Some(2));
        let scaled = math.scaled_score.expect("scaled");
        assert!(scaled > 90 && scaled <= 100);
        assert_eq!(math.percentile, Some(85.0));
        assert_eq!(math.wrong_answers, vec![5, 8, 15]);
    }

    #[test]
    fn absent_scenario() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!("결시"))).expect("subject");
        let math = &s.process().expect("process").records["1001"].subjects["Math"];
        assert_eq!(
            (math.grade, math.scaled_score, math.percentile),
            (Some(9), Some(0), Some(0.0))
        );
        assert!(math.wrong_answers.is_empty());
        assert_eq!(math.derivation, Derivation::ZeroScore);
    }

    #[test]
    fn fatal_preconditions() {
        let mut s = session();
        assert_eq!(s.process().expect_err("roster").code(), "no_roster");
        kim_roster(&mut s);
        assert_eq!(s.process().expect_err("subjects").code(), "no_subject_data");

        let mut stray = math_rows(json!(70));
        stray[0].insert("examinee_identifier".into(), json!("2002"));
        s.load_subject("Math", stray).expect("subject");
        assert_eq!(s.process().expect_err("empty").code(), "no_processed_data");
    }

    #[test]
    fn examinee_cap_is_enforced() {
        let mut s = session();
        s.configure(&json!({ "maxExaminees": 1 })).expect("configure");
        s.load_roster(&rows(json!([
            { "examinee_identifier": "1", "name": "A" },
            { "examinee_identifier": "2", "name": "B" }
        ])))
        .expect("roster");
        let mut two = math_rows(json!(50));
        let mut second = two[0].clone();
        second.insert("examinee_identifier".into(), json!("2"));
        two[0].insert("examinee_identifier".into(), json!("1"));
        two.push(second);
        s.load_subject("Math", two).expect("subject");
        let e = s.process().expect_err("cap");
        assert_eq!(e.code(), "too_many_examinees");
    }

    #[test]
    fn reprocessing_is_idempotent() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!(88))).expect("subject");
        s.load_subject("Korean", math_rows(json!(64.5))).expect("subject");
        let first = s.process().expect("first").clone();
        let second = s.process().expect("second").clone();
        assert_eq!(first.records, second.records);
        assert_eq!(first.input_digest, second.input_digest);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn uploaded_table_replaces_default() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!(88))).expect("subject");
        let summary = s
            .load_cutoffs(&rows(json!([{
                "과목명": "수학", "과목코드": "02",
                "1등급컷": 85, "2등급컷": 75, "3등급컷": 65, "4등급컷": 55, "5등급컷": 45,
                "6등급컷": 35, "7등급컷": 25, "8등급컷": 15, "9등급컷": 0
            }, {
                "과목명": "천문학", "과목코드": "40",
                "1등급컷": 85, "2등급컷": 75, "3등급컷": 65, "4등급컷": 55, "5등급컷": 45,
                "6등급컷": 35, "7등급컷": 25, "8등급컷": 15, "9등급컷": 0
            }])))
            .expect("cutoffs");
        assert_eq!(summary.unreachable, vec!["천문학".to_string()]);
        let result = s.process().expect("process");
        assert_eq!(result.cutoff_origin, TableOrigin::Loaded);
        assert_eq!(result.records["1001"].subjects["Math"].grade, Some(1));

        assert_eq!(s.use_default_cutoffs(), s.registry().len());
        let result = s.process().expect("process");
        assert_eq!(result.records["1001"].subjects["Math"].grade, Some(2));
    }

    #[test]
    fn anchor_overlay_changes_scaled_scores_only() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!(85))).expect("subject");
        let before = s.process().expect("process").records["1001"].subjects["Math"].clone();
        assert_eq!(before.scaled_score, Some(95));

        let summary = s
            .load_anchors(&rows(json!([{
                "Subject_Name": "Math", "subject_code": "02",
                "Grade_1_Score": 140, "Grade_2_Score": 130, "Grade_3_Score": 120,
                "Grade_4_Score": 110, "Grade_5_Score": 100, "Grade_6_Score": 90,
                "Grade_7_Score": 80, "Grade_8_Score": 70, "Grade_9_Score": 60
            }])))
            .expect("anchors");
        assert_eq!(summary.applied, vec!["수학".to_string()]);
        assert!(summary.rejected.is_empty());

        let after = &s.process().expect("process").records["1001"].subjects["Math"];
        assert_eq!(after.grade, before.grade);
        assert_eq!(after.scaled_score, Some(135));

        s.use_default_cutoffs();
        let reset = &s.process().expect("process").records["1001"].subjects["Math"];
        assert_eq!(reset.scaled_score, Some(95));
    }

    #[test]
    fn subjects_missing_from_table_keep_raw_scores() {
        let mut s = session();
        kim_roster(&mut s);
        s.load_subject("Math", math_rows(json!(88))).expect("subject");
        s.load_cutoffs(&rows(json!([{
            "subject_name": "국어", "subject_code": "01",
            "grade_1_cutoff": 90, "grade_2_cutoff": 80, "grade_3_cutoff": 70,
            "grade_4_cutoff": 60, "grade_5_cutoff": 50, "grade_6_cutoff": 40,
            "grade_7_cutoff": 30, "grade_8_cutoff": 20, "grade_9_cutoff": 0
        }])))
        .expect("cutoffs");
        let result = s.process().expect("process");
        let math = &result.records["1001"].subjects["Math"];
        assert_eq!(math.total_score, 88.0);
        assert_eq!((math.grade, math.scaled_score, math.percentile), (None, None, None));
        assert_eq!(result.calc.unmatched, 1);
    }

    #[test]
    fn switching_merge_mode_drops_subject_files() {
        let mut s = session();
        s.load_subject("Math", math_rows(json!(88))).expect("subject");
        assert!(s.configure(&json!({ "mergeMode": "by_name" })).expect("configure"));
        assert!(s.subjects().is_empty());
        assert!(!s.configure(&json!({ "maxExaminees": 10 })).expect("configure"));
    }
}
