use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::IngestError;

const DEFAULT_CONFIG_FILE: &str = "eco-ingest.json";

/// On-disk configuration, all keys optional. Command-line flags override
/// whatever the file provides.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub storage_root: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub commit_every: Option<usize>,
    #[serde(default)]
    pub converter: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Fully resolved settings for one import run.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub repository: String,
    pub storage_root: String,
    pub site_url: Option<String>,
    pub commit_every: usize,
    pub converter: String,
    pub sources: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config file if present. An explicitly named file must
    /// exist; the default `eco-ingest.json` is optional and its absence
    /// resolves to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IngestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(IngestError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| IngestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IngestError> {
        for source in &config.sources {
            if !catalog::source_names().contains(&source.as_str()) {
                return Err(IngestError::UnknownSource(source.clone()));
            }
        }
        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            repository: config.repository.unwrap_or_else(|| "repository".to_string()),
            storage_root: config
                .storage_root
                .unwrap_or_else(|| catalog::DEFAULT_STORAGE_ROOT.to_string()),
            site_url: config.site_url,
            commit_every: config.commit_every.unwrap_or(10).max(1),
            converter: config.converter.unwrap_or_else(|| "gdal_translate".to_string()),
            sources: config.sources,
        })
    }
}
