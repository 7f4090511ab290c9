//! Configuration management for facetry
//!
//! Read from a TOML file; every section is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub facets: FacetSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

/// Facet storage and aggregation settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FacetSettings {
    /// Index field backing the ordinal (sorted-set doc-values) encoding
    #[serde(default = "default_sorted_set_field")]
    pub sorted_set_facet_field: String,

    /// Separator between hierarchy levels in facet labels and raw values
    #[serde(default = "default_path_separator")]
    pub path_separator: String,

    /// Count facet sub-queries on the rayon pool
    #[serde(default = "default_true")]
    pub parallel_sub_queries: bool,
}

fn default_sorted_set_field() -> String {
    "$facets$sdv".to_string()
}

fn default_path_separator() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FacetSettings {
    fn default() -> Self {
        Self {
            sorted_set_facet_field: default_sorted_set_field(),
            path_separator: default_path_separator(),
            parallel_sub_queries: default_true(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `path` if given and present, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load_from(path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.facets.path_separator.is_empty() {
            anyhow::bail!("facets.path_separator must not be empty");
        }
        if self.facets.sorted_set_facet_field.trim().is_empty() {
            anyhow::bail!("facets.sorted_set_facet_field must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.facets.sorted_set_facet_field, "$facets$sdv");
        assert_eq!(config.facets.path_separator, "/");
        assert!(config.facets.parallel_sub_queries);
    }

    #[test]
    fn test_partial_file() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[facets]
path_separator = "|"
parallel_sub_queries = false
"#,
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.facets.path_separator, "|");
        assert!(!config.facets.parallel_sub_queries);
        assert_eq!(config.facets.sorted_set_facet_field, "$facets$sdv");
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn test_empty_separator_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        fs::write(&path, "[facets]\npath_separator = \"\"\n")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back() -> Result<()> {
        let temp = TempDir::new()?;
        let config = Config::load_or_default(Some(&temp.path().join("absent.toml")))?;
        assert_eq!(config.facets, FacetSettings::default());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested/config.toml");
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        config.save(&path)?;
        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.logging.level, "debug");
        Ok(())
    }
}
