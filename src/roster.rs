use std::collections::BTreeMap;

use crate::error::EngineResult;
use crate::table::{cell_text, identifier_text, resolve_columns, Column, TableRow};

/// Exam number -> display name, as delivered by the roster file.
///
/// Names are stored unvalidated; the merger decides which ones are usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    names: BTreeMap<String, String>,
}

impl Roster {
    pub fn from_rows(rows: &[TableRow]) -> EngineResult<Self> {
        let cols = resolve_columns("roster", rows, &[Column::ExamineeId, Column::Name])?;
        let mut names = BTreeMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let Some(id) = identifier_text(cols.cell(row, Column::ExamineeId)) else {
                tracing::debug!(row = idx, "roster row without exam number ignored");
                continue;
            };
            let name = cell_text(cols.cell(row, Column::Name)).unwrap_or_default();
            if let Some(prev) = names.insert(id.clone(), name) {
                tracing::warn!(examinee = %id, previous = %prev, "duplicate exam number in roster; later row wins");
            }
        }
        Ok(Roster { names })
    }

    pub fn name_of(&self, examinee_id: &str) -> Option<&str> {
        self.names.get(examinee_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
