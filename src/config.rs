use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// How `/query` answers are delivered
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Chunked plain-text body, rendered as it arrives
    #[default]
    Stream,
    /// Single `{"answer": ...}` JSON body
    Json,
}

impl ResponseMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stream" => Some(ResponseMode::Stream),
            "json" => Some(ResponseMode::Json),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub response_mode: ResponseMode,
    pub upload_enabled: bool,
    pub ocr_language: String,
    pub tesseract_path: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            response_mode: ResponseMode::Stream,
            upload_enabled: false,
            ocr_language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_at(&Self::get_config_path()?)
    }

    pub fn load_at(config_path: &Path) -> Result<Self> {
        let mut config = Self::load_from(config_path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", config_path, e))?;
        Ok(config)
    }

    /// Environment variables win over the config file
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("VERDICTA_API_URL").ok(),
            std::env::var("VERDICTA_RESPONSE_MODE").ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, response_mode: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(mode) = response_mode.as_deref().and_then(ResponseMode::from_str) {
            self.response_mode = mode;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("verdicta"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.response_mode, ResponseMode::Stream);
        assert!(!config.upload_enabled);
    }

    #[test]
    fn test_written_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.response_mode = ResponseMode::Json;
        config.upload_enabled = true;
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"response_mode":"json"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.response_mode, ResponseMode::Json);
        assert_eq!(config.ocr_language, "eng");
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_load_at_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_url": 42}"#).unwrap();

        let err = Config::load_at(&path).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config file"));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::new();
        config.apply_overrides(Some("http://api.example:9000".into()), Some("JSON".into()));
        assert_eq!(config.api_url, "http://api.example:9000");
        assert_eq!(config.response_mode, ResponseMode::Json);

        config.apply_overrides(Some("  ".into()), Some("carrier-pigeon".into()));
        assert_eq!(config.api_url, "http://api.example:9000");
        assert_eq!(config.response_mode, ResponseMode::Json);
    }
}
