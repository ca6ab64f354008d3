use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{ContentType, LayerMeta, Record};
use crate::error::IngestError;
use crate::pipeline::Sink;

const MARKER_FILE: &str = ".eco-repository";
const OBJECT_FILE: &str = "object.json";
const JOB_FILE: &str = "job.json";
const TECH_FILE: &str = "tech.json";
const COMMIT_LOG: &str = "commit.log";

/// Skeleton folders created by `init` and searched by `list`/`cleanup`.
pub const DATASET_ROOTS: [&str; 3] = [
    "datasets/climate",
    "datasets/environmental",
    "datasets/species",
];

/// Per-object background-job progress, persisted next to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Completed,
    Removed,
}

#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    state: JobState,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RepositoryMarker {
    version: u32,
    created_at: String,
}

/// Writes and reads the per-object job markers. Marking a path creates its
/// directory if needed so a marker can precede object creation.
#[derive(Debug, Clone)]
pub struct JobTracker {
    root: Utf8PathBuf,
}

impl JobTracker {
    pub fn set_state(&self, object_path: &str, state: JobState) -> Result<(), IngestError> {
        let dir = self.root.join(object_path);
        fs::create_dir_all(&dir).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let record = JobRecord {
            state,
            updated_at: Utc::now().to_rfc3339(),
        };
        write_json_atomic(&dir.join(JOB_FILE), &record)
    }

    pub fn state(&self, object_path: &str) -> Result<Option<JobState>, IngestError> {
        let path = self.root.join(object_path).join(JOB_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text =
            fs::read_to_string(&path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let record: JobRecord = serde_json::from_str(&text)
            .map_err(|err| IngestError::Filesystem(format!("bad job record {path}: {err}")))?;
        Ok(Some(record.state))
    }
}

/// Persisted form of a created content object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub title: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub owner: String,
    pub creators: String,
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<String>,
    pub layermeta: LayerMeta,
    pub downloadable: bool,
    /// Workflow state after applying the record's transition.
    pub state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub created_at: String,
}

/// Content store rooted at a local directory. The CMS analogue: one
/// directory per object holding its metadata document, attachment payloads
/// and job marker.
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: Utf8PathBuf,
}

impl FsRepository {
    /// Create the repository skeleton. An existing repository is an error
    /// unless `replace` is set, in which case it is recreated empty.
    pub fn init(root: impl Into<Utf8PathBuf>, replace: bool) -> Result<Self, IngestError> {
        let root = root.into();
        let marker = root.join(MARKER_FILE);
        if marker.exists() {
            if !replace {
                return Err(IngestError::Filesystem(format!(
                    "repository already exists at {root} (use --replace to recreate)"
                )));
            }
            fs::remove_dir_all(&root).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        for dataset_root in DATASET_ROOTS {
            fs::create_dir_all(root.join(dataset_root))
                .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        let doc = RepositoryMarker {
            version: 1,
            created_at: Utc::now().to_rfc3339(),
        };
        write_json_atomic(&marker, &doc)?;
        info!(root = %root, "repository initialized");
        Ok(Self { root })
    }

    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, IngestError> {
        let root = root.into();
        if !root.join(MARKER_FILE).exists() {
            return Err(IngestError::RepositoryMissing(root.into_std_path_buf()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn job_tracker(&self) -> JobTracker {
        JobTracker {
            root: self.root.clone(),
        }
    }

    /// Persist a record as a content object: attachment payloads as plain
    /// files, metadata as an atomically written JSON document.
    pub fn create(&self, record: &Record) -> Result<Utf8PathBuf, IngestError> {
        let dir = self.root.join(&record.path);
        fs::create_dir_all(&dir).map_err(|err| IngestError::Filesystem(err.to_string()))?;

        let mut attachment_names = Vec::new();
        for attachment in record.attachments.values() {
            fs::write(dir.join(&attachment.filename), &attachment.data)
                .map_err(|err| IngestError::Filesystem(err.to_string()))?;
            attachment_names.push(attachment.filename.clone());
        }

        let state = match record.transition.as_deref() {
            Some("publish") => "published".to_string(),
            Some(other) => other.to_string(),
            None => "private".to_string(),
        };
        let object = StoredObject {
            path: record.path.clone(),
            title: record.title.clone(),
            content_type: record.content_type,
            format: record.format.clone(),
            description: record.description.clone(),
            external_description: record.external_description.clone(),
            remote_url: record.remote_url.clone(),
            owner: record.owner.clone(),
            creators: record.creators.clone(),
            data_source: record.data_source.clone(),
            subject: record.subject.clone(),
            layermeta: record.layermeta.clone(),
            downloadable: record.downloadable,
            state,
            attachments: attachment_names,
            created_at: Utc::now().to_rfc3339(),
        };
        write_json_atomic(&dir.join(OBJECT_FILE), &object)?;
        info!(path = %record.path, "object created");
        Ok(dir)
    }

    pub fn load(&self, object_path: &str) -> Result<StoredObject, IngestError> {
        let path = self.root.join(object_path).join(OBJECT_FILE);
        if !path.exists() {
            return Err(IngestError::ObjectNotFound(object_path.to_string()));
        }
        let text =
            fs::read_to_string(&path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|err| IngestError::Filesystem(format!("bad object document {path}: {err}")))
    }

    /// Absolute path of a stored attachment payload.
    pub fn attachment_path(&self, object_path: &str, filename: &str) -> Utf8PathBuf {
        self.root.join(object_path).join(filename)
    }

    pub fn write_tech_metadata<T: Serialize>(
        &self,
        object_path: &str,
        tech: &T,
    ) -> Result<(), IngestError> {
        let dir = self.root.join(object_path);
        if !dir.join(OBJECT_FILE).exists() {
            return Err(IngestError::ObjectNotFound(object_path.to_string()));
        }
        write_json_atomic(&dir.join(TECH_FILE), tech)
    }

    /// Every stored object under the dataset roots, sorted by path.
    pub fn list(&self) -> Result<Vec<StoredObject>, IngestError> {
        let mut objects = Vec::new();
        for dataset_root in DATASET_ROOTS {
            let root = self.root.join(dataset_root);
            if root.as_std_path().exists() {
                collect_objects(self, &root, &mut objects)?;
            }
        }
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    pub fn delete(&self, object_path: &str) -> Result<(), IngestError> {
        let dir = self.root.join(object_path);
        if !dir.join(OBJECT_FILE).exists() {
            return Err(IngestError::ObjectNotFound(object_path.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    /// Delete every object whose job marker says REMOVED, committing after
    /// each deletion. Returns the number of objects removed.
    pub fn cleanup(&self) -> Result<usize, IngestError> {
        let tracker = self.job_tracker();
        let mut removed = 0;
        for object in self.list()? {
            if tracker.state(&object.path)? == Some(JobState::Removed) {
                info!(path = %object.path, "cleanup: deleting");
                self.delete(&object.path)?;
                self.commit(&format!("cleanup {}", object.path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Append a commit boundary to the repository journal. Object writes are
    /// already atomic; the journal records batch boundaries.
    pub fn commit(&self, note: &str) -> Result<(), IngestError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(COMMIT_LOG))
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        writeln!(file, "{} {note}", Utc::now().to_rfc3339())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        info!(note, "commit");
        Ok(())
    }

    pub fn commit_count(&self) -> Result<usize, IngestError> {
        let path = self.root.join(COMMIT_LOG);
        if !path.exists() {
            return Ok(0);
        }
        let text =
            fs::read_to_string(&path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(text.lines().count())
    }
}

fn collect_objects(
    repo: &FsRepository,
    dir: &Utf8Path,
    out: &mut Vec<StoredObject>,
) -> Result<(), IngestError> {
    if dir.join(OBJECT_FILE).as_std_path().exists() {
        let object_path = dir
            .strip_prefix(&repo.root)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        out.push(repo.load(object_path.as_str())?);
        return Ok(());
    }
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() {
            let child = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|path| IngestError::Filesystem(format!("non-utf8 path {path:?}")))?;
            collect_objects(repo, &child, out)?;
        }
    }
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), IngestError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    fs::rename(&tmp, path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Terminal pipeline sink: creates content objects and commits every N
/// consumed records. `commit_every = 1` commits per object.
pub struct ContentSink<'a> {
    repo: &'a FsRepository,
    commit_every: usize,
    pending: usize,
    created: usize,
}

impl<'a> ContentSink<'a> {
    pub fn new(repo: &'a FsRepository, commit_every: usize) -> Self {
        Self {
            repo,
            commit_every: commit_every.max(1),
            pending: 0,
            created: 0,
        }
    }

    pub fn created(&self) -> usize {
        self.created
    }
}

impl Sink for ContentSink<'_> {
    fn consume(&mut self, record: Record) -> Result<(), IngestError> {
        self.repo.create(&record)?;
        self.pending += 1;
        self.created += 1;
        if self.pending >= self.commit_every {
            self.repo.commit(&format!("{} objects", self.pending))?;
            self.pending = 0;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        if self.pending > 0 {
            self.repo.commit(&format!("{} objects", self.pending))?;
            self.pending = 0;
        }
        Ok(())
    }
}
