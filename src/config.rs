//! Run configuration, passed explicitly into the pipeline.
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "full_scale": 20.0,
//!   "paper_max": 4.0,
//!   "scores_header_row": 4,
//!   "render": { "latex_font_size": "small" }
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Rendering options applied when nothing overrides them.
pub const DEFAULT_RENDER_OPTIONS: &[(&str, &str)] = &[
    ("latex_documentclass_options", "a4paper,10pt,landscape"),
    ("latex_font_size", "tiny"),
    ("latex_geometry_options", "top=1cm,right=1cm,bottom=1cm,left=1cm"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    /// Grades are expressed out of this value.
    pub full_scale: f64,
    /// Raw grading unit on the answer sheet, independent of question weight.
    pub paper_max: f64,
    /// 0-based row holding the student header (`Nom`, `Prénom`, ...).
    pub scores_header_row: usize,
    /// Only the first `pages` pages are considered when > 0.
    pub pages: i64,
    pub results_per_page: usize,
    pub target_mean: Option<f64>,
    pub target_std: Option<f64>,
    /// Overrides of [`DEFAULT_RENDER_OPTIONS`], plus any extra key.
    pub render: BTreeMap<String, String>,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            full_scale: 20.0,
            paper_max: 4.0,
            scores_header_row: 4,
            pages: -1,
            results_per_page: 3,
            target_mean: None,
            target_std: None,
            render: BTreeMap::new(),
        }
    }
}

impl ExamConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let config: ExamConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        config
            .check()
            .with_context(|| format!("invalid config '{}'", path.display()))?;
        Ok(config)
    }

    /// Rejects values that would turn every grade into NaN or infinity.
    pub fn check(&self) -> Result<()> {
        if !(self.paper_max.is_finite() && self.paper_max > 0.0) {
            bail!("paper_max must be a positive number, got {}", self.paper_max);
        }
        if !(self.full_scale.is_finite() && self.full_scale > 0.0) {
            bail!("full_scale must be a positive number, got {}", self.full_scale);
        }
        if let Some(mean) = self.target_mean.filter(|m| !m.is_finite()) {
            bail!("target mean must be finite, got {mean}");
        }
        if let Some(std) = self.target_std.filter(|s| !(s.is_finite() && *s >= 0.0)) {
            bail!("target std must be a non-negative number, got {std}");
        }
        Ok(())
    }

    /// Default rendering options with this config's overrides applied.
    pub fn render_options(&self) -> BTreeMap<String, String> {
        let mut options: BTreeMap<String, String> = DEFAULT_RENDER_OPTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        options.extend(self.render.iter().map(|(k, v)| (k.clone(), v.clone())));
        options
    }
}

/// Parses a `name:value` rendering option. Only the first `:` separates.
pub fn parse_option(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name:value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExamConfig::default();
        assert_eq!(config.full_scale, 20.0);
        assert_eq!(config.paper_max, 4.0);

        let options = config.render_options();
        assert_eq!(options["latex_font_size"], "tiny");
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ExamConfig =
            serde_json::from_str(r#"{"paper_max": 5, "render": {"latex_font_size": "small"}}"#)
                .unwrap();

        assert_eq!(config.paper_max, 5.0);
        assert_eq!(config.full_scale, 20.0);
        let options = config.render_options();
        assert_eq!(options["latex_font_size"], "small");
        assert_eq!(options["latex_documentclass_options"], "a4paper,10pt,landscape");
    }

    #[test]
    fn test_check_rejects_degenerate_values() {
        assert!(ExamConfig::default().check().is_ok());

        let bad = [
            ExamConfig { paper_max: 0.0, ..ExamConfig::default() },
            ExamConfig { paper_max: -4.0, ..ExamConfig::default() },
            ExamConfig { full_scale: f64::INFINITY, ..ExamConfig::default() },
            ExamConfig { target_mean: Some(f64::NAN), ..ExamConfig::default() },
            ExamConfig { target_std: Some(f64::NAN), ..ExamConfig::default() },
            ExamConfig { target_std: Some(-1.0), ..ExamConfig::default() },
        ];
        for config in &bad {
            assert!(config.check().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn test_load_rejects_zero_paper_max() {
        let path = std::env::temp_dir().join("exam_stats_test_zero_paper_max.json");
        std::fs::write(&path, r#"{"paper_max": 0}"#).unwrap();

        let err = ExamConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("paper_max must be a positive number"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(
            parse_option("latex_font_size:small").unwrap(),
            ("latex_font_size".to_string(), "small".to_string())
        );
        assert_eq!(parse_option("a:b:c").unwrap().1, "b:c");
        assert!(parse_option("no_separator").is_err());
        assert!(parse_option(":value").is_err());
    }
}
