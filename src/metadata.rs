use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::thread::JoinHandle;

use camino::Utf8PathBuf;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::pipeline::{RecordStream, Stage};
use crate::repository::{FsRepository, JobState, JobTracker};

/// A deferred technical-metadata recomputation for one created object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataJob {
    pub object_path: String,
    pub download_url: String,
}

/// Fire-and-forget hand-off: the submitter never sees a result.
pub trait TaskQueue {
    fn submit(&self, job: MetadataJob);
}

/// Collects jobs during the pipeline run; the caller drains them once the
/// final commit is done and runs them in the background.
#[derive(Debug, Default)]
pub struct DeferredTaskQueue {
    jobs: RefCell<Vec<MetadataJob>>,
}

impl DeferredTaskQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn drain(&self) -> Vec<MetadataJob> {
        self.jobs.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }
}

impl TaskQueue for DeferredTaskQueue {
    fn submit(&self, job: MetadataJob) {
        self.jobs.borrow_mut().push(job);
    }
}

/// Schedules technical-metadata recomputation for every record passing
/// through. Without a configured site URL the public download URL cannot be
/// built, so the stage degrades to a logged no-op pass-through.
pub struct MetadataUpdateStage {
    site_url: Option<String>,
    queue: Rc<dyn TaskQueue>,
    tracker: JobTracker,
}

impl MetadataUpdateStage {
    pub fn new(site_url: Option<String>, queue: Rc<dyn TaskQueue>, tracker: JobTracker) -> Self {
        Self {
            site_url,
            queue,
            tracker,
        }
    }
}

impl Stage for MetadataUpdateStage {
    fn name(&self) -> &'static str {
        "metadata-update"
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        let MetadataUpdateStage {
            site_url,
            queue,
            tracker,
        } = *self;
        let Some(site_url) = site_url else {
            warn!("no site url configured; metadata update disabled");
            return input;
        };
        let site_url = site_url.trim_end_matches('/').to_string();
        Box::new(input.map(move |item| {
            let record = item?;
            let filename = record.filename()?;
            let download_url = format!("{site_url}/{}/@@download/file/{filename}", record.path);
            tracker.set_state(&record.path, JobState::Pending)?;
            queue.submit(MetadataJob {
                object_path: record.path.clone(),
                download_url,
            });
            Ok(record)
        }))
    }
}

/// File-level technical metadata recomputed by the background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechMetadata {
    pub download_url: String,
    pub filename: String,
    pub size: u64,
    pub sha256: String,
    pub format: String,
    pub updated_at: String,
}

fn detect_format(filename: &str, declared: Option<&str>) -> String {
    let lower = filename.to_lowercase();
    if lower.ends_with(".zip") {
        "application/zip".to_string()
    } else if lower.ends_with(".csv") {
        "text/csv".to_string()
    } else if lower.ends_with(".tif") || lower.ends_with(".tiff") {
        "image/geotiff".to_string()
    } else {
        declared
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// Recompute checksum, size and detected format for the object's primary
/// payload, persist them, and mark the job COMPLETED.
pub fn execute_job(repo: &FsRepository, job: &MetadataJob) -> Result<(), IngestError> {
    let object = repo.load(&job.object_path)?;
    let filename = object
        .attachments
        .first()
        .ok_or_else(|| IngestError::ObjectNotFound(format!("{}: no payload", job.object_path)))?;
    let payload = repo.attachment_path(&job.object_path, filename);
    let data = fs::read(&payload).map_err(|err| IngestError::Filesystem(err.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&data);
    let tech = TechMetadata {
        download_url: job.download_url.clone(),
        filename: filename.clone(),
        size: data.len() as u64,
        sha256: format!("{:x}", hasher.finalize()),
        format: detect_format(filename, object.format.as_deref()),
        updated_at: Utc::now().to_rfc3339(),
    };
    repo.write_tech_metadata(&job.object_path, &tech)?;
    repo.job_tracker()
        .set_state(&job.object_path, JobState::Completed)?;
    Ok(())
}

/// Run drained jobs on a background thread. Job failures are logged, never
/// propagated; callers may join the handle before process exit.
pub fn run_jobs_in_background(
    repository_root: Utf8PathBuf,
    jobs: Vec<MetadataJob>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let repo = match FsRepository::open(repository_root) {
            Ok(repo) => repo,
            Err(err) => {
                warn!(error = %err, "metadata jobs skipped: repository unavailable");
                return;
            }
        };
        for job in jobs {
            match execute_job(&repo, &job) {
                Ok(()) => info!(path = %job.object_path, "metadata updated"),
                Err(err) => warn!(path = %job.object_path, error = %err, "metadata job failed"),
            }
        }
    })
}
