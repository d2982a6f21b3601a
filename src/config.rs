//! User configuration.
//!
//! Read from `<config_dir>/sarek/config.yaml` unless a path is given. A
//! missing file means defaults; a file that cannot be read or parsed is
//! reported and replaced by defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detect::Thresholds;
use crate::project::WalkFilters;

/// Models chosen by [`route_model`](crate::prompt::route_model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routing {
    pub code: String,
    pub math: String,
    pub creative: String,
    pub general: String,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            code: "codellama".to_string(),
            math: "mistral".to_string(),
            creative: "llama2".to_string(),
            general: "mistral".to_string(),
        }
    }
}

/// Settings for file and tree analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Entries held by the in-memory analysis cache.
    pub cache_capacity: usize,
    /// Files listed in the complexity ranking.
    pub top_n: usize,
    /// Keep analysis results in the database between runs.
    pub persist_cache: bool,
    /// Extensions to analyze; empty means all supported ones.
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
    pub max_file_bytes: Option<u64>,
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let filters = WalkFilters::default();
        Self {
            cache_capacity: 1024,
            top_n: 10,
            persist_cache: true,
            extensions: filters.extensions,
            ignore: filters.ignore,
            max_file_bytes: filters.max_file_bytes,
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn filters(&self) -> WalkFilters {
        WalkFilters {
            extensions: self.extensions.clone(),
            ignore: self.ignore.clone(),
            max_file_bytes: self.max_file_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_model: String,
    /// Past turns sent with each question. Each exchange is two turns, so
    /// the default covers the last three exchanges.
    pub context_limit: usize,
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    pub oracle_timeout_secs: u64,
    /// Defaults to `<data_dir>/sarek.db`.
    pub database_path: Option<PathBuf>,
    pub routing: Routing,
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "mistral".to_string(),
            context_limit: 6,
            ollama_url: "http://localhost:11434".to_string(),
            oracle_timeout_secs: 120,
            database_path: None,
            routing: Routing::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "sarek")
}

impl Config {
    /// Standard location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` (or the standard location), falling back to
    /// defaults when the file is missing or unusable.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            debug!("no configuration directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Self::default();
        }

        match Self::parse_file(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{:#}", err), "ignoring configuration file");
                Self::default()
            }
        }
    }

    /// Write as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        fs::write(path, serde_yaml::to_string(self)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("sarek.db"))
            .unwrap_or_else(|| PathBuf::from("sarek.db"))
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }
}

/// Reject settings the rest of the crate cannot work with.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.default_model.trim().is_empty() {
        bail!("default_model must not be empty");
    }
    let routes = [
        ("code", &config.routing.code),
        ("math", &config.routing.math),
        ("creative", &config.routing.creative),
        ("general", &config.routing.general),
    ];
    for (name, model) in routes {
        if model.trim().is_empty() {
            bail!("routing.{} must name a model", name);
        }
    }
    if config.ollama_url.trim().is_empty() {
        bail!("ollama_url must not be empty");
    }
    if config.oracle_timeout_secs == 0 {
        bail!("oracle_timeout_secs must be positive");
    }
    if config.analysis.cache_capacity == 0 {
        bail!("analysis.cache_capacity must be positive");
    }
    if config.analysis.top_n == 0 {
        bail!("analysis.top_n must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.context_limit, 6);
        assert_eq!(config.analysis.cache_capacity, 1024);
        assert_eq!(config.analysis.thresholds, Thresholds::default());
        assert!(config.analysis.ignore.iter().any(|p| p == "node_modules"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "default_model: llama3\nanalysis:\n  top_n: 5\n  thresholds:\n    max_nesting_depth: 4\n",
        )
        .unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.default_model, "llama3");
        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.analysis.thresholds.max_nesting_depth, 4);
        assert_eq!(config.analysis.thresholds.max_file_lines, 500);
        assert_eq!(config.context_limit, 6);
        assert_eq!(config.routing, Routing::default());
    }

    #[test]
    fn test_corrupt_or_missing_file_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        assert_eq!(Config::load(Some(&path)), Config::default());

        fs::write(&path, "context_limit: [not, a, number\n").unwrap();
        assert_eq!(Config::load(Some(&path)), Config::default());
        assert!(Config::parse_file(&path).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.yaml");
        let mut config = Config::default();
        config.context_limit = 7;
        config.database_path = Some(temp.path().join("x.db"));
        config.save(&path).unwrap();

        assert_eq!(Config::parse_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.analysis.cache_capacity = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.routing.math = " ".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("routing.math"));
    }
}
