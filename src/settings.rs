use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ContasError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Strict duplicate similarity threshold (word overlap / smaller set).
    #[serde(default = "default_strict_similarity")]
    pub strict_similarity: f64,
    /// Loose merge-candidate threshold (word overlap / larger set).
    #[serde(default = "default_loose_similarity")]
    pub loose_similarity: f64,
    /// Expense z-score above which a transaction is flagged unusual.
    #[serde(default = "default_z_threshold")]
    pub anomaly_z_threshold: f64,
}

fn default_strict_similarity() -> f64 {
    crate::dedup::MatchConfig::default().strict_similarity
}

fn default_loose_similarity() -> f64 {
    crate::dedup::MatchConfig::default().loose_similarity
}

fn default_z_threshold() -> f64 {
    crate::summary::DEFAULT_Z_THRESHOLD
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            strict_similarity: default_strict_similarity(),
            loose_similarity: default_loose_similarity(),
            anomaly_z_threshold: default_z_threshold(),
        }
    }
}

impl Settings {
    pub fn match_config(&self) -> crate::dedup::MatchConfig {
        crate::dedup::MatchConfig {
            strict_similarity: self.strict_similarity,
            loose_similarity: self.loose_similarity,
            ..Default::default()
        }
    }

    pub fn anomaly_config(&self) -> crate::summary::AnomalyConfig {
        crate::summary::AnomalyConfig {
            z_threshold: self.anomaly_z_threshold,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("contas.db")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("contas")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("contas")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ContasError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
