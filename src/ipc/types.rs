use serde::Deserialize;

use crate::session::Session;
use crate::table::TableRow;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// `params.rows` as table rows; every element must be a JSON object.
    pub fn rows_param(&self) -> Result<Vec<TableRow>, String> {
        let Some(rows) = self.params.get("rows") else {
            return Err("missing params.rows".to_string());
        };
        let Some(rows) = rows.as_array() else {
            return Err("params.rows must be an array".to_string());
        };
        rows.iter()
            .enumerate()
            .map(|(i, r)| {
                r.as_object()
                    .cloned()
                    .ok_or_else(|| format!("params.rows[{i}] must be an object"))
            })
            .collect()
    }
}

pub struct AppState {
    pub session: Session,
}
