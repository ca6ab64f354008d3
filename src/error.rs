use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("unknown emission scenario: {0}")]
    UnknownEmissionScenario(String),

    #[error("unknown dataset source: {0}")]
    UnknownSource(String),

    #[error("invalid record path: {0}")]
    InvalidRecordPath(String),

    #[error("config file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download request failed: {0}")]
    FetchHttp(String),

    #[error("download of {url} returned status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("raster conversion tool not found: {0}")]
    MissingConverter(String),

    #[error("raster conversion of {path} failed with exit code {code}")]
    ConversionFailed { path: String, code: i32 },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("repository not initialized at {0} (run `eco-ingest init`)")]
    RepositoryMissing(PathBuf),

    #[error("object not found in repository: {0}")]
    ObjectNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
