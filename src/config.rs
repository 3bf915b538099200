//! Engine configuration.
//!
//! Loaded once at startup from the TOML file named by `SCORECARDD_CONFIG`
//! (absent file means defaults), then patched per session by
//! `session.configure`.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "SCORECARDD_CONFIG";

/// How subject-file rows are joined to examinees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Rows carry an exam number that is looked up in the roster.
    #[default]
    ByIdentifier,
    /// Rows carry the display name directly; no roster is needed.
    ByName,
}

/// Where percentiles come from once a grade is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileSource {
    /// Fixed band per grade (1 -> 95 ... 9 -> 15).
    #[default]
    GradeBand,
    /// Per-grade percentile columns of the cutoff file, when a subject has all nine.
    CutoffTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    pub merge_mode: MergeMode,
    pub percentile_source: PercentileSource,
    pub max_examinees: usize,
    pub score_anomaly_above: f64,
    pub correct_count_anomaly_above: f64,
    pub name_max_chars: usize,
    pub name_forbidden_chars: String,
    pub absentee_tokens: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            merge_mode: MergeMode::ByIdentifier,
            percentile_source: PercentileSource::GradeBand,
            max_examinees: 1000,
            score_anomaly_above: 100.0,
            correct_count_anomaly_above: 50.0,
            name_max_chars: 20,
            name_forbidden_chars: "<>|?*".to_string(),
            absentee_tokens: ["결시", "absent", "미응시", "불참", "no-show", "nan", "none"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        let cfg: EngineConfig = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.to_string_lossy()))?;
        Ok(cfg)
    }

    /// Reads the file named by `SCORECARDD_CONFIG`, or defaults when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => Self::load(Path::new(&p)),
            _ => Ok(Self::default()),
        }
    }

    /// Applies a partial camelCase JSON object on top of this config.
    pub fn patched(&self, patch: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        if let (Some(base), Some(over)) = (merged.as_object_mut(), patch.as_object()) {
            for (k, v) in over {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(merged)
    }

    /// Case-insensitive match against the absentee markers.
    pub fn is_absentee_token(&self, s: &str) -> bool {
        let t = s.trim().to_lowercase();
        !t.is_empty() && self.absentee_tokens.iter().any(|a| a.to_lowercase() == t)
    }

    pub fn name_is_acceptable(&self, name: &str) -> bool {
        name.chars().count() <= self.name_max_chars
            && !name.chars().any(|c| self.name_forbidden_chars.contains(c))
    }
}
