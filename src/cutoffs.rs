use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::subjects::{
    canonical_name, english_subject_name, is_inquiry_code, SubjectRegistry, LANGUAGE_PROFICIENCY,
    NATIONAL_HISTORY,
};
use crate::table::{cell_f64, cell_text, find_header, headers, TableRow};

pub const GRADE_COUNT: usize = 9;

const STANDARD_LADDER: [f64; GRADE_COUNT] = [90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 0.0];
const HISTORY_LADDER: [f64; GRADE_COUNT] = [40.0, 35.0, 30.0, 25.0, 20.0, 15.0, 10.0, 5.0, 0.0];
const INQUIRY_LADDER: [f64; GRADE_COUNT] = [45.0, 40.0, 35.0, 30.0, 25.0, 20.0, 15.0, 10.0, 0.0];
const DEFAULT_MAX_SCALED: f64 = 100.0;

const SUBJECT_NAME_HEADERS: &[&str] = &["subject_name", "과목명"];
const SUBJECT_CODE_HEADERS: &[&str] = &["subject_code", "과목코드"];
const MAX_SCALED_HEADERS: &[&str] = &["max_scaled_score", "만점표점", "만점_표점"];

fn cutoff_headers(grade: usize) -> [String; 2] {
    [format!("grade_{grade}_cutoff"), format!("{grade}등급컷")]
}

fn anchor_headers(grade: usize) -> [String; 3] {
    [
        format!("grade_{grade}_scaled"),
        format!("{grade}등급표점"),
        format!("{grade}등급_표점"),
    ]
}

/// Scaled-score tables name subjects in English or Korean.
const SCALED_NAME_HEADERS: &[&str] = &["Subject_Name", "subject_name", "과목명"];

fn scaled_table_headers(grade: usize) -> [String; 4] {
    [
        format!("Grade_{grade}_Score"),
        format!("grade_{grade}_scaled"),
        format!("{grade}등급표점"),
        format!("{grade}등급_표점"),
    ]
}

fn percentile_headers(grade: usize) -> [String; 2] {
    [format!("grade_{grade}_percentile"), format!("{grade}등급백분위")]
}

/// Grade cutoffs and scaling anchors for one subject.
///
/// Index 0 holds grade 1 (best). Thresholds never increase from grade 1 to 9.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffEntry {
    pub subject_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_code: Option<String>,
    pub thresholds: [f64; GRADE_COUNT],
    pub max_scaled_score: f64,
    pub anchors: [f64; GRADE_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<[f64; GRADE_COUNT]>,
}

impl CutoffEntry {
    pub fn threshold(&self, grade: u8) -> Option<f64> {
        grade_index(grade).map(|i| self.thresholds[i])
    }

    pub fn anchor(&self, grade: u8) -> Option<f64> {
        grade_index(grade).map(|i| self.anchors[i])
    }

    pub fn percentile(&self, grade: u8) -> Option<f64> {
        let p = self.percentiles.as_ref()?;
        grade_index(grade).map(|i| p[i])
    }

    /// Subjects with a zero maximum scaled score get a grade only.
    pub fn is_scaled(&self) -> bool {
        self.max_scaled_score != 0.0
    }
}

fn grade_index(grade: u8) -> Option<usize> {
    let g = grade as usize;
    if (1..=GRADE_COUNT).contains(&g) {
        Some(g - 1)
    } else {
        None
    }
}

/// Anchors descending in ten-percent steps from `max`.
fn generated_anchors(max: f64) -> [f64; GRADE_COUNT] {
    let mut out = [0.0; GRADE_COUNT];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = max * (10 - i) as f64 / 10.0;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOrigin {
    Generated,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub row: usize,
    pub subject: String,
    pub reason: String,
}

/// Result of overlaying a scaled-score table on a cutoff table.
#[derive(Debug, Clone)]
pub struct AnchorOverlay {
    pub table: CutoffTable,
    pub applied: Vec<String>,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone)]
pub struct CutoffLoad {
    pub table: CutoffTable,
    pub rejected: Vec<Rejection>,
}

/// Per-subject cutoff table keyed by canonical subject name.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffTable {
    entries: BTreeMap<String, CutoffEntry>,
    origin: TableOrigin,
}

impl CutoffTable {
    #[cfg(test)]
    pub fn empty() -> Self {
        CutoffTable {
            entries: BTreeMap::new(),
            origin: TableOrigin::Loaded,
        }
    }

    /// Table used when the caller supplies none.
    pub fn default_table(registry: &SubjectRegistry) -> Self {
        let mut entries = BTreeMap::new();
        for name in registry.names() {
            let (thresholds, max_scaled_score) = match name {
                LANGUAGE_PROFICIENCY => (STANDARD_LADDER, 0.0),
                NATIONAL_HISTORY => (HISTORY_LADDER, 0.0),
                _ => (STANDARD_LADDER, DEFAULT_MAX_SCALED),
            };
            entries.insert(
                name.to_string(),
                CutoffEntry {
                    subject_name: name.to_string(),
                    subject_code: registry.code_for(name).map(|c| c.to_string()),
                    thresholds,
                    max_scaled_score,
                    anchors: generated_anchors(max_scaled_score),
                    percentiles: None,
                },
            );
        }
        CutoffTable {
            entries,
            origin: TableOrigin::Generated,
        }
    }

    /// Builds a table from parsed cutoff-file rows.
    ///
    /// A subject with any of its nine cutoffs missing or unparsable is left out
    /// entirely and reported in [`CutoffLoad::rejected`].
    pub fn load(rows: &[TableRow]) -> EngineResult<CutoffLoad> {
        const TABLE: &str = "cutoff table";
        if rows.is_empty() {
            return Err(EngineError::EmptyTable {
                table: TABLE.to_string(),
            });
        }
        let available = headers(rows);
        let name_h = find_header(&available, SUBJECT_NAME_HEADERS);
        let code_h = find_header(&available, SUBJECT_CODE_HEADERS);
        let (Some(name_h), Some(code_h)) = (name_h, code_h) else {
            let mut missing = Vec::new();
            if name_h.is_none() {
                missing.push(SUBJECT_NAME_HEADERS[0].to_string());
            }
            if code_h.is_none() {
                missing.push(SUBJECT_CODE_HEADERS[0].to_string());
            }
            return Err(EngineError::MissingColumns {
                table: TABLE.to_string(),
                missing,
                available,
            });
        };

        let max_h = find_header(&available, MAX_SCALED_HEADERS);
        let cutoff_h: Vec<Option<&str>> = (1..=GRADE_COUNT)
            .map(|g| find_header(&available, &cutoff_headers(g)[..]))
            .collect();
        let anchor_h: Vec<Option<&str>> = (1..=GRADE_COUNT)
            .map(|g| find_header(&available, &anchor_headers(g)[..]))
            .collect();
        let pct_h: Vec<Option<&str>> = (1..=GRADE_COUNT)
            .map(|g| find_header(&available, &percentile_headers(g)[..]))
            .collect();

        let mut entries: BTreeMap<String, CutoffEntry> = BTreeMap::new();
        let mut rejected: Vec<Rejection> = Vec::new();

        'rows: for (idx, row) in rows.iter().enumerate() {
            let Some(raw_name) = cell_text(row.get(name_h)) else {
                rejected.push(Rejection {
                    row: idx,
                    subject: String::new(),
                    reason: "blank subject name".to_string(),
                });
                continue;
            };
            let subject_name = canonical_name(&raw_name);

            let mut thresholds = [0.0; GRADE_COUNT];
            for (i, h) in cutoff_h.iter().enumerate() {
                let grade = i + 1;
                let Some(h) = h else {
                    rejected.push(Rejection {
                        row: idx,
                        subject: subject_name.clone(),
                        reason: format!("no column for grade {grade} cutoff"),
                    });
                    continue 'rows;
                };
                match cell_f64(row.get(*h)) {
                    Some(v) => thresholds[i] = v,
                    None => {
                        rejected.push(Rejection {
                            row: idx,
                            subject: subject_name.clone(),
                            reason: format!("grade {grade} cutoff is missing or not numeric"),
                        });
                        continue 'rows;
                    }
                }
            }
            if let Some(i) = (1..GRADE_COUNT).find(|&i| thresholds[i] > thresholds[i - 1]) {
                rejected.push(Rejection {
                    row: idx,
                    subject: subject_name.clone(),
                    reason: format!(
                        "grade {} cutoff {} is above grade {} cutoff {}",
                        i + 1,
                        thresholds[i],
                        i,
                        thresholds[i - 1]
                    ),
                });
                continue;
            }

            let max_scaled_score = max_h
                .and_then(|h| cell_f64(row.get(h)))
                .unwrap_or(DEFAULT_MAX_SCALED);
            let mut anchors = generated_anchors(max_scaled_score);
            for (i, h) in anchor_h.iter().enumerate() {
                if let Some(v) = h.and_then(|h| cell_f64(row.get(h))) {
                    anchors[i] = v;
                }
            }

            let pct: Vec<f64> = pct_h
                .iter()
                .filter_map(|h| h.and_then(|h| cell_f64(row.get(h))))
                .collect();
            let percentiles = <[f64; GRADE_COUNT]>::try_from(pct).ok();

            if entries.contains_key(&subject_name) {
                tracing::warn!(subject = %subject_name, row = idx, "duplicate cutoff row replaces earlier one");
            }
            entries.insert(
                subject_name.clone(),
                CutoffEntry {
                    subject_name,
                    subject_code: cell_text(row.get(code_h)),
                    thresholds,
                    max_scaled_score,
                    anchors,
                    percentiles,
                },
            );
        }

        Ok(CutoffLoad {
            table: CutoffTable {
                entries,
                origin: TableOrigin::Loaded,
            },
            rejected,
        })
    }

    /// Fillable cutoff-file rows, one per catalogue subject. Inquiry subjects
    /// get the 50-point ladder; the rows load back through [`CutoffTable::load`].
    pub fn template_rows(registry: &SubjectRegistry) -> Vec<TableRow> {
        registry
            .names()
            .map(|name| {
                let code = registry.code_for(name).unwrap_or_default();
                let (thresholds, max) = match name {
                    LANGUAGE_PROFICIENCY => (STANDARD_LADDER, 0.0),
                    NATIONAL_HISTORY => (HISTORY_LADDER, 0.0),
                    _ if is_inquiry_code(code) => (INQUIRY_LADDER, DEFAULT_MAX_SCALED),
                    _ => (STANDARD_LADDER, DEFAULT_MAX_SCALED),
                };
                let anchors = generated_anchors(max);
                let mut row = TableRow::new();
                row.insert("과목명".into(), json!(name));
                row.insert("과목코드".into(), json!(code));
                row.insert("만점_표점".into(), json!(max as i64));
                for (i, t) in thresholds.iter().enumerate() {
                    row.insert(format!("{}등급컷", i + 1), json!(*t as i64));
                }
                for (i, a) in anchors.iter().enumerate() {
                    row.insert(format!("{}등급_표점", i + 1), json!(*a as i64));
                }
                row
            })
            .collect()
    }

    /// Replaces per-grade scaled-score anchors from a scaled-score table.
    ///
    /// Subjects may be named in English (`Physics_I`) or Korean. A row is
    /// rejected as a whole when the subject is not in this table, carries no
    /// scaled score, or any of its nine anchors is missing, non-numeric or
    /// above the anchor of the grade before it.
    pub fn with_anchors(&self, rows: &[TableRow]) -> EngineResult<AnchorOverlay> {
        const TABLE: &str = "scaled score table";
        if rows.is_empty() {
            return Err(EngineError::EmptyTable {
                table: TABLE.to_string(),
            });
        }
        let available = headers(rows);
        let name_h = find_header(&available, SCALED_NAME_HEADERS);
        let anchor_h: Vec<Option<&str>> = (1..=GRADE_COUNT)
            .map(|g| find_header(&available, &scaled_table_headers(g)[..]))
            .collect();
        let mut missing = Vec::new();
        if name_h.is_none() {
            missing.push(SCALED_NAME_HEADERS[0].to_string());
        }
        for (i, h) in anchor_h.iter().enumerate() {
            if h.is_none() {
                missing.push(scaled_table_headers(i + 1)[0].clone());
            }
        }
        let Some(name_h) = name_h.filter(|_| missing.is_empty()) else {
            return Err(EngineError::MissingColumns {
                table: TABLE.to_string(),
                missing,
                available,
            });
        };

        let mut table = self.clone();
        let mut applied: Vec<String> = Vec::new();
        let mut rejected: Vec<Rejection> = Vec::new();

        'rows: for (idx, row) in rows.iter().enumerate() {
            let Some(raw_name) = cell_text(row.get(name_h)) else {
                rejected.push(Rejection {
                    row: idx,
                    subject: String::new(),
                    reason: "blank subject name".to_string(),
                });
                continue;
            };
            let subject = english_subject_name(&raw_name)
                .map(str::to_string)
                .unwrap_or_else(|| canonical_name(&raw_name));
            let reject = |reason: String| Rejection {
                row: idx,
                subject: subject.clone(),
                reason,
            };

            let Some(entry) = table.entries.get_mut(&subject) else {
                rejected.push(reject("subject is not in the active cutoff table".to_string()));
                continue;
            };
            if !entry.is_scaled() {
                rejected.push(reject("subject carries no scaled score".to_string()));
                continue;
            }

            let mut anchors = [0.0; GRADE_COUNT];
            for (i, h) in anchor_h.iter().enumerate() {
                match h.and_then(|h| cell_f64(row.get(h))) {
                    Some(v) => anchors[i] = v,
                    None => {
                        rejected.push(reject(format!(
                            "grade {} scaled score is missing or not numeric",
                            i + 1
                        )));
                        continue 'rows;
                    }
                }
            }
            if let Some(i) = (1..GRADE_COUNT).find(|&i| anchors[i] > anchors[i - 1]) {
                rejected.push(reject(format!(
                    "grade {} scaled score {} is above grade {} scaled score {}",
                    i + 1,
                    anchors[i],
                    i,
                    anchors[i - 1]
                )));
                continue;
            }

            entry.anchors = anchors;
            if applied.contains(&subject) {
                tracing::warn!(subject = %subject, row = idx, "duplicate scaled-score row replaces earlier one");
            } else {
                applied.push(subject);
            }
        }

        Ok(AnchorOverlay {
            table,
            applied,
            rejected,
        })
    }

    pub fn get(&self, subject: &str) -> Option<&CutoffEntry> {
        self.entries
            .get(subject)
            .or_else(|| self.entries.get(&canonical_name(subject)))
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.get(subject).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CutoffEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn origin(&self) -> TableOrigin {
        self.origin
    }
}
