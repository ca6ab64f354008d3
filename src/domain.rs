use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Dataset genre tags recognized by the portal's layer metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genre {
    #[serde(rename = "DataGenreCC")]
    CurrentClimate,
    #[serde(rename = "DataGenreFC")]
    FutureClimate,
    #[serde(rename = "DataGenreE")]
    Environmental,
    #[serde(rename = "DataGenreSO")]
    SpeciesOccurrence,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genre::CurrentClimate => write!(f, "DataGenreCC"),
            Genre::FutureClimate => write!(f, "DataGenreFC"),
            Genre::Environmental => write!(f, "DataGenreE"),
            Genre::SpeciesOccurrence => write!(f, "DataGenreSO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Dataset with an embedded file payload.
    Dataset,
    /// Dataset referenced by remote URL, materialized on demand.
    RemoteDataset,
}

/// Descriptive layer metadata attached to every dataset object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMeta {
    pub genre: Option<Genre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emsc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// One named file payload carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// One prospective content item moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Destination path inside the repository, e.g. `datasets/climate/...`.
    pub path: String,
    pub owner: String,
    pub content_type: ContentType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub creators: String,
    pub data_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<String>,
    pub layermeta: LayerMeta,
    pub downloadable: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, FileAttachment>,
}

impl Record {
    /// A remote dataset descriptor with the conventional ingest defaults.
    pub fn remote(path: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner: "admin".to_string(),
            content_type: ContentType::RemoteDataset,
            title: title.into(),
            description: None,
            external_description: None,
            remote_url: Some(url.into()),
            format: Some("application/zip".to_string()),
            creators: "ecoportal".to_string(),
            data_source: "ingest".to_string(),
            transition: Some("publish".to_string()),
            subject: Vec::new(),
            layermeta: LayerMeta::default(),
            downloadable: true,
            attachments: BTreeMap::new(),
        }
    }

    /// A dataset descriptor carrying an embedded file payload.
    pub fn embedded(
        path: impl Into<String>,
        title: impl Into<String>,
        attachment: FileAttachment,
    ) -> Self {
        let format = Some(attachment.content_type.clone());
        let mut attachments = BTreeMap::new();
        attachments.insert("file".to_string(), attachment);
        Self {
            path: path.into(),
            owner: "admin".to_string(),
            content_type: ContentType::Dataset,
            title: title.into(),
            description: None,
            external_description: None,
            remote_url: None,
            format,
            creators: "ecoportal".to_string(),
            data_source: "ingest".to_string(),
            transition: Some("publish".to_string()),
            subject: Vec::new(),
            layermeta: LayerMeta::default(),
            downloadable: true,
            attachments,
        }
    }

    /// Last segment of the destination path, used as the object id and for
    /// substring filters in the download stage.
    pub fn filename(&self) -> Result<&str, IngestError> {
        self.path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| IngestError::InvalidRecordPath(self.path.clone()))
    }
}

/// Human-readable titles for the emission scenario vocabulary. Unknown keys
/// are an error: a catalog entry referencing a scenario outside the
/// vocabulary would otherwise produce a dataset nobody can find by facet.
pub fn emsc_title(emsc: &str) -> Result<&'static str, IngestError> {
    let title = match emsc {
        "RCP3PD" => "RCP 2.6",
        "RCP45" => "RCP 4.5",
        "RCP6" => "RCP 6.0",
        "RCP85" => "RCP 8.5",
        "SRESA1B" => "SRES A1B",
        "SRESA1FI" => "SRES A1FI",
        "SRESA2" => "SRES A2",
        "SRESB1" => "SRES B1",
        "SRESB2" => "SRES B2",
        other => return Err(IngestError::UnknownEmissionScenario(other.to_string())),
    };
    Ok(title)
}
