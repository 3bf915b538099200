//! Column contract for the tabular inputs.
//!
//! Rows arrive already parsed by the caller's CSV/Excel reader, one JSON object
//! per row. Headers are matched against a fixed set of accepted spellings: the
//! English keys and the headers used by the exam vendor's export files.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{EngineError, EngineResult};

pub type TableRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Column {
    ExamineeId,
    Name,
    SubjectLabel,
    SubjectCode,
    TotalScore,
    CorrectCount,
    WrongAnswers,
}

impl Column {
    pub fn key(self) -> &'static str {
        match self {
            Column::ExamineeId => "examinee_identifier",
            Column::Name => "name",
            Column::SubjectLabel => "chosen_subject_label",
            Column::SubjectCode => "chosen_subject_code",
            Column::TotalScore => "total_score",
            Column::CorrectCount => "correct_count",
            Column::WrongAnswers => "wrong_answer_numbers",
        }
    }

    pub fn spellings(self) -> &'static [&'static str] {
        match self {
            Column::ExamineeId => &["examinee_identifier", "exam_number", "수험번호"],
            Column::Name => &["name", "display_name", "이름", "성명"],
            Column::SubjectLabel => &["chosen_subject_label", "선택과목"],
            Column::SubjectCode => &["chosen_subject_code", "선택과목코드"],
            Column::TotalScore => &["total_score", "총점"],
            Column::CorrectCount => &["correct_count", "정답수"],
            Column::WrongAnswers => &["wrong_answer_numbers", "오답번호"],
        }
    }
}

/// Sorted union of every header seen across `rows`.
pub fn headers(rows: &[TableRow]) -> Vec<String> {
    let mut out: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        for k in row.keys() {
            out.insert(k.as_str());
        }
    }
    out.into_iter().map(|s| s.to_string()).collect()
}

/// Picks the first accepted spelling present in `headers`.
pub fn find_header<'a, S: AsRef<str>>(headers: &'a [String], spellings: &[S]) -> Option<&'a str> {
    for s in spellings {
        let want = s.as_ref();
        if let Some(h) = headers.iter().find(|h| h.trim() == want) {
            return Some(h.as_str());
        }
    }
    None
}

/// Header names resolved for one table, keyed by [`Column`].
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    resolved: Vec<(Column, String)>,
}

impl ColumnMap {
    pub fn header(&self, col: Column) -> Option<&str> {
        self.resolved
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, h)| h.as_str())
    }

    pub fn cell<'r>(&self, row: &'r TableRow, col: Column) -> Option<&'r Value> {
        self.header(col).and_then(|h| row.get(h))
    }
}

/// Resolves `required` columns against the table's headers.
///
/// Fails with [`EngineError::MissingColumns`] naming every missing column and
/// every header that was available, or [`EngineError::EmptyTable`] when there
/// are no rows to infer headers from.
pub fn resolve_columns(table: &str, rows: &[TableRow], required: &[Column]) -> EngineResult<ColumnMap> {
    if rows.is_empty() {
        return Err(EngineError::EmptyTable {
            table: table.to_string(),
        });
    }
    let available = headers(rows);
    let mut map = ColumnMap::default();
    let mut missing: Vec<String> = Vec::new();
    for col in required {
        match find_header(&available, col.spellings()) {
            Some(h) => map.resolved.push((*col, h.to_string())),
            None => missing.push(col.key().to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(EngineError::MissingColumns {
            table: table.to_string(),
            missing,
            available,
        });
    }
    Ok(map)
}

/// Renders a cell as trimmed text. Null cells and blank strings yield `None`.
///
/// Integral numbers render without a fractional part so that `1001` and
/// `1001.0` produce the same identifier.
pub fn cell_text(v: Option<&Value>) -> Option<String> {
    let s = match v? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => number_text(n),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Renders an exam-number cell. Text such as `"1001.0"` joins the same
/// examinee as the number `1001`; leading zeros are kept.
pub fn identifier_text(v: Option<&Value>) -> Option<String> {
    let s = cell_text(v)?;
    match s.split_once('.') {
        Some((head, frac))
            if !head.is_empty()
                && head.chars().all(|c| c.is_ascii_digit())
                && !frac.is_empty()
                && frac.chars().all(|c| c == '0') =>
        {
            Some(head.to_string())
        }
        _ => Some(s),
    }
}

/// Parses a cell as a finite number. Text cells are trimmed first.
pub fn cell_f64(v: Option<&Value>) -> Option<f64> {
    let f = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if f.is_finite() {
        Some(f)
    } else {
        None
    }
}

/// Text tokens that spreadsheet readers emit for an empty cell.
pub fn is_null_token(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t.eq_ignore_ascii_case("nan") || t == "None"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> TableRow {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn resolves_korean_headers() {
        let rows = vec![row(json!({
            "수험번호": 1001,
            "선택과목": "화법과 작문",
            "선택과목코드": "06",
            "총점": 88,
            "정답수": 22,
            "오답번호": "5, 8"
        }))];
        let map = resolve_columns(
            "Korean",
            &rows,
            &[Column::ExamineeId, Column::SubjectCode, Column::WrongAnswers],
        )
        .expect("columns");
        assert_eq!(map.header(Column::ExamineeId), Some("수험번호"));
        assert_eq!(
            cell_text(map.cell(&rows[0], Column::ExamineeId)).as_deref(),
            Some("1001")
        );
    }

    #[test]
    fn missing_columns_lists_missing_and_available() {
        let rows = vec![row(json!({ "examinee_identifier": "1", "total_score": 3 }))];
        let e = resolve_columns("Math", &rows, &[Column::ExamineeId, Column::CorrectCount])
            .expect_err("missing");
        match e {
            EngineError::MissingColumns {
                missing, available, ..
            } => {
                assert_eq!(missing, vec!["correct_count".to_string()]);
                assert_eq!(available, vec!["examinee_identifier", "total_score"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn integral_floats_render_as_integers() {
        assert_eq!(cell_text(Some(&json!(1001.0))).as_deref(), Some("1001"));
        assert_eq!(cell_text(Some(&json!(7.5))).as_deref(), Some("7.5"));
        assert_eq!(cell_text(Some(&json!("  "))), None);
        assert_eq!(cell_text(Some(&json!(null))), None);
    }

    #[test]
    fn identifiers_from_text_and_numbers_agree() {
        assert_eq!(identifier_text(Some(&json!("1001.0"))).as_deref(), Some("1001"));
        assert_eq!(identifier_text(Some(&json!(1001.0))).as_deref(), Some("1001"));
        assert_eq!(identifier_text(Some(&json!(" 01001.00 "))).as_deref(), Some("01001"));
        assert_eq!(identifier_text(Some(&json!("1001.5"))).as_deref(), Some("1001.5"));
        assert_eq!(identifier_text(Some(&json!("A-1.0"))).as_deref(), Some("A-1.0"));
        assert_eq!(identifier_text(Some(&json!("1001."))).as_deref(), Some("1001."));
    }

    #[test]
    fn cell_f64_rejects_non_finite_text() {
        assert_eq!(cell_f64(Some(&json!(" 88.5 "))), Some(88.5));
        assert_eq!(cell_f64(Some(&json!("inf"))), None);
        assert_eq!(cell_f64(Some(&json!("NaN"))), None);
        assert_eq!(cell_f64(Some(&json!("absent"))), None);
    }
}
