use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub dedup: DedupConfig,
    pub pipeline: PipelineConfig,
    pub sources: SourcesConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Upper bound on in-flight requests across all sources.
    pub max_concurrency: u32,
    pub requests_per_min: Option<u64>,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            max_concurrency: 8,
            requests_per_min: None,
            user_agent: format!("holiday_ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub name_similarity_threshold: f64,
    pub date_window_days: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.85,
            date_window_days: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub run_budget_seconds: u64,
    pub years_ahead: u32,
    pub enabled_sources: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_budget_seconds: 600,
            years_ahead: 2,
            enabled_sources: constants::all_sources()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub nager: NagerConfig,
    pub calendarific: KeyedSourceConfig,
    pub abstract_api: KeyedSourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NagerConfig {
    pub base_url: String,
    pub max_countries: usize,
    pub api_key: Option<String>,
}

impl Default for NagerConfig {
    fn default() -> Self {
        Self {
            base_url: constants::NAGER_BASE_URL.to_string(),
            max_countries: 50,
            api_key: None,
        }
    }
}

/// Settings shared by the sources that require an API key.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeyedSourceConfig {
    pub base_url: Option<String>,
    pub countries: Option<Vec<String>>,
    pub api_key: Option<String>,
}

impl KeyedSourceConfig {
    /// The configured key, treating blank strings as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "data/holidays.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
        }
    }
}

impl Config {
    /// Read a TOML config file, then fill credentials from the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus credentials from the environment, for runs without a config file.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Keys set in the file win over the environment.
    pub fn apply_env(&mut self) {
        fn env_key(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        if self.sources.nager.api_key.is_none() {
            self.sources.nager.api_key = env_key("NAGER_API_KEY");
        }
        if self.sources.calendarific.api_key().is_none() {
            self.sources.calendarific.api_key = env_key("CALENDARIFIC_API_KEY");
        }
        if self.sources.abstract_api.api_key().is_none() {
            self.sources.abstract_api.api_key = env_key("ABSTRACT_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.dedup.name_similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(IngestError::Config(format!(
                "dedup.name_similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if self.dedup.date_window_days < 0 {
            return Err(IngestError::Config(format!(
                "dedup.date_window_days must not be negative, got {}",
                self.dedup.date_window_days
            )));
        }
        if self.http.max_concurrency == 0 {
            return Err(IngestError::Config(
                "http.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.http.timeout_seconds == 0 {
            return Err(IngestError::Config(
                "http.timeout_seconds must be at least 1".to_string(),
            ));
        }
        for source in &self.pipeline.enabled_sources {
            if !constants::all_sources().contains(&source.as_str()) {
                return Err(IngestError::Config(format!(
                    "Unknown source '{}' in pipeline.enabled_sources",
                    source
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dedup_constants() {
        let config = Config::default();
        assert_eq!(config.dedup.name_similarity_threshold, 0.85);
        assert_eq!(config.dedup.date_window_days, 3);
        assert_eq!(config.http.timeout_seconds, 10);
        assert_eq!(config.pipeline.years_ahead, 2);
        assert_eq!(config.pipeline.enabled_sources.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dedup]
            date_window_days = 5

            [sources.calendarific]
            api_key = "secret"
            countries = ["NZ"]
            "#,
        )
        .unwrap();

        assert_eq!(config.dedup.date_window_days, 5);
        assert_eq!(config.dedup.name_similarity_threshold, 0.85);
        assert_eq!(config.sources.calendarific.api_key(), Some("secret"));
        assert_eq!(
            config.sources.calendarific.countries,
            Some(vec!["NZ".to_string()])
        );
        assert_eq!(config.sources.nager.max_countries, 50);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let keyed = KeyedSourceConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(keyed.api_key(), None);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.dedup.name_similarity_threshold = 1.5;
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));

        config.dedup.name_similarity_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_source() {
        let mut config = Config::default();
        config.pipeline.enabled_sources.push("google".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
