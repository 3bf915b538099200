use std::collections::HashMap;

use crate::cutoffs::CutoffTable;
use crate::error::{EngineError, EngineResult};

/// Language-proficiency subject: graded, but never scaled.
pub const LANGUAGE_PROFICIENCY: &str = "영어";
/// National-history subject: graded on a lower ladder, never scaled.
pub const NATIONAL_HISTORY: &str = "한국사";

/// Canonical subject names and their two-digit codes, in catalogue order.
const BUILTIN_SUBJECTS: &[(&str, &str)] = &[
    ("국어", "01"),
    ("수학", "02"),
    ("확률과 통계", "03"),
    ("미적분", "04"),
    ("언어와 매체", "05"),
    ("화법과 작문", "06"),
    (LANGUAGE_PROFICIENCY, "07"),
    (NATIONAL_HISTORY, "08"),
    ("기하", "09"),
    ("생활과 윤리", "11"),
    ("윤리와 사상", "12"),
    ("한국지리", "13"),
    ("세계지리", "14"),
    ("동아시아사", "15"),
    ("세계사", "16"),
    ("경제", "17"),
    ("정치와 법", "18"),
    ("사회·문화", "19"),
    ("물리학 I", "21"),
    ("화학 I", "22"),
    ("생명과학 I", "23"),
    ("지구과학 I", "24"),
    ("물리학 II", "25"),
    ("화학 II", "26"),
    ("생명과학 II", "27"),
    ("지구과학 II", "28"),
];

/// English subject names used by scaled-score tables.
const ENGLISH_SUBJECT_NAMES: &[(&str, &str)] = &[
    ("Korean", "국어"),
    ("Language_and_Media", "언어와 매체"),
    ("Speech_and_Writing", "화법과 작문"),
    ("Math", "수학"),
    ("Probability_and_Statistics", "확률과 통계"),
    ("Calculus", "미적분"),
    ("Geometry", "기하"),
    ("English", LANGUAGE_PROFICIENCY),
    ("Korean_History", NATIONAL_HISTORY),
    ("Life_and_Ethics", "생활과 윤리"),
    ("Ethics_and_Ideology", "윤리와 사상"),
    ("Korean_Geography", "한국지리"),
    ("World_Geography", "세계지리"),
    ("East_Asian_History", "동아시아사"),
    ("World_History", "세계사"),
    ("Economics", "경제"),
    ("Politics_and_Law", "정치와 법"),
    ("Social_Culture", "사회·문화"),
    ("Physics_I", "물리학 I"),
    ("Chemistry_I", "화학 I"),
    ("Biology_I", "생명과학 I"),
    ("Earth_Science_I", "지구과학 I"),
    ("Physics_II", "물리학 II"),
    ("Chemistry_II", "화학 II"),
    ("Biology_II", "생명과학 II"),
    ("Earth_Science_II", "지구과학 II"),
];

/// Bidirectional map between canonical subject names and subject codes.
///
/// Fixed at construction; shared read-only across a processing run.
#[derive(Debug, Clone)]
pub struct SubjectRegistry {
    entries: Vec<(String, String)>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl SubjectRegistry {
    pub fn builtin() -> Self {
        // The built-in catalogue is checked for duplicate codes by the tests below.
        Self::from_entries(
            BUILTIN_SUBJECTS
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string())),
        )
        .unwrap_or_else(|e| panic!("built-in subject catalogue is invalid: {e}"))
    }

    pub fn from_entries<I>(entries: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut out = SubjectRegistry {
            entries: Vec::new(),
            by_code: HashMap::new(),
            by_name: HashMap::new(),
        };
        for (name, code) in entries {
            let name = canonical_name(&name);
            let code = normalize_code(&code);
            if let Some(&idx) = out.by_code.get(&code) {
                return Err(EngineError::DuplicateSubjectCode {
                    code,
                    first: out.entries[idx].0.clone(),
                    second: name,
                });
            }
            let idx = out.entries.len();
            out.by_code.insert(code.clone(), idx);
            out.by_name.insert(name.clone(), idx);
            out.entries.push((name, code));
        }
        Ok(out)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn code_for(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&canonical_name(name))
            .map(|&i| self.entries[i].1.as_str())
    }

    /// Resolves a raw subject code to a canonical subject name, but only if
    /// `table` has an entry for that subject.
    pub fn resolve(&self, raw_code: &str, table: &CutoffTable) -> Option<&str> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return None;
        }
        let &idx = self.by_code.get(&code)?;
        let name = self.entries[idx].0.as_str();
        if table.contains(name) {
            Some(name)
        } else {
            None
        }
    }

    /// Resolves a raw subject code against the catalogue alone.
    pub fn name_for_code(&self, raw_code: &str) -> Option<&str> {
        let &idx = self.by_code.get(&normalize_code(raw_code))?;
        Some(self.entries[idx].0.as_str())
    }
}

impl Default for SubjectRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `"7"`, `"07"` and `"07.0"` all normalize to `"07"`.
pub fn normalize_code(raw: &str) -> String {
    let t = raw.trim();
    let head = match t.split_once('.') {
        Some((h, _)) => h.trim(),
        None => t,
    };
    if head.chars().count() == 1 {
        format!("0{}", head)
    } else {
        head.to_string()
    }
}

/// Canonical name for an English subject name such as `Physics_I`.
/// Matching ignores case and treats spaces like underscores.
pub fn english_subject_name(raw: &str) -> Option<&'static str> {
    let key = raw.split_whitespace().collect::<Vec<_>>().join("_");
    ENGLISH_SUBJECT_NAMES
        .iter()
        .find(|(en, _)| en.eq_ignore_ascii_case(&key))
        .map(|&(_, name)| name)
}

/// Social and science inquiry subjects (codes 11 and up) are scored out of 50.
pub fn is_inquiry_code(code: &str) -> bool {
    normalize_code(code).parse::<u32>().map(|c| c >= 11).unwrap_or(false)
}

/// Canonical spelling of a subject name: trimmed, inner whitespace collapsed,
/// and roman-numeral glyphs spelled with ASCII letters.
pub fn canonical_name(raw: &str) -> String {
    let spelled = raw.replace('Ⅱ', " II").replace('Ⅰ', " I");
    spelled.split_whitespace().collect::<Vec<_>>().join(" ")
}
