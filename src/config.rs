//! Pipeline configuration. Every stage receives the parts it needs from a
//! [`PipelineConfig`]; nothing reads paths or rules from globals.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "sismia.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub ingest: IngestConfig,
    pub attendance: AttendanceConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one folder of platform exports per community.
    pub raw_root: PathBuf,
    pub dataset: PathBuf,
    pub annotations: PathBuf,
    pub taxonomy: PathBuf,
    pub uncategorized: PathBuf,
    pub report: PathBuf,
    pub report_json: PathBuf,
    pub suggestion: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Exact file name to community, for exports filed under the wrong city.
    pub file_overrides: BTreeMap<String, String>,
    /// Lower-case file-name keyword to community.
    pub keyword_overrides: BTreeMap<String, String>,
    /// Club-owned accounts that appear in exports but never participate.
    pub admin_accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    pub impute_pending: bool,
    pub seed: u64,
    pub attended_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub days_between_events: i64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::rooted_at(Path::new("data"))
    }
}

impl PathsConfig {
    /// Standard layout below a data directory.
    pub fn rooted_at(data_dir: &Path) -> Self {
        Self {
            raw_root: data_dir.join("raw").join("athletiks"),
            dataset: data_dir.join("clean").join("dataset_modelo.csv"),
            annotations: data_dir.join("entrada").join("anotaciones_manuales.csv"),
            taxonomy: data_dir.join("entrada").join("tipos_evento.csv"),
            uncategorized: data_dir.join("entrada").join("eventos_sin_tipo.csv"),
            report: data_dir.join("clean").join("informe_pipeline.md"),
            report_json: data_dir.join("clean").join("informe_pipeline.json"),
            suggestion: data_dir.join("clean").join("proxima_fecha_sugerida.csv"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        let keyword_overrides = [("elche", "ELCHE"), ("jueves", "ELCHE")]
            .into_iter()
            .map(|(keyword, community)| (keyword.to_string(), community.to_string()))
            .collect();

        Self {
            file_overrides: BTreeMap::new(),
            keyword_overrides,
            admin_accounts: vec![
                "SISTERHOOD RUNNING CLUB".to_string(),
                "SISTERHOOD RC ELCHE".to_string(),
            ],
        }
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            impute_pending: true,
            seed: 42,
            attended_probability: 0.85,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            days_between_events: 30,
        }
    }
}

impl PipelineConfig {
    /// Explicit file first, then `sismia.toml` in the working directory,
    /// then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Self::from_file(fallback);
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = self.attendance.attended_probability;
        if !(0.0..=1.0).contains(&p) {
            anyhow::bail!("attendance.attended_probability must be within 0..=1, got {p}");
        }
        if self.schedule.days_between_events < 1 {
            anyhow::bail!("schedule.days_between_events must be positive");
        }
        Ok(())
    }
}
