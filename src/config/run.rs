use super::evaluation::EvaluationConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Where to write the JSON selection report.
    pub json_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    /// Voxel dumps of the candidate RVEs, in ranking order.
    pub candidates: Vec<PathBuf>,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

pub fn load_config(path: &Path) -> Result<RunConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let mut config: RunConfig = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    // Candidate paths are relative to the config file.
    if let Some(dir) = path.parent() {
        for candidate in &mut config.candidates {
            if candidate.is_relative() {
                *candidate = dir.join(&*candidate);
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_parses_with_defaults() {
        let text = r#"{
            "candidates": ["data/1/QP_FFT_data.txt", "/abs/2.txt"],
            "evaluation": {
                "resolution": 1.0,
                "phases": [{"label": 1, "mu": 0.5, "sigma": 0.75, "alpha": 3.82, "beta": 2.99, "fraction": 1.0}]
            }
        }"#;
        let cfg: RunConfig = serde_json::from_str(text).expect("parse");
        assert_eq!(cfg.candidates.len(), 2);
        assert!(cfg.output.json_out.is_none());
        assert!(cfg.evaluation.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(err.contains("/nonexistent/run.json"));
    }
}
