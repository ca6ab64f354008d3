use std::fs;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use ecoportal_ingest::app::{self, ImportOptions};
use ecoportal_ingest::catalog;
use ecoportal_ingest::config::{Config, ConfigLoader, ResolvedConfig};
use ecoportal_ingest::domain::Genre;
use ecoportal_ingest::error::IngestError;
use ecoportal_ingest::materialize::{DownloadStage, Fetcher, NameFilter, RasterConverter};
use ecoportal_ingest::metadata::{self, DeferredTaskQueue, MetadataUpdateStage, TaskQueue};
use ecoportal_ingest::pipeline::Pipeline;
use ecoportal_ingest::repository::{ContentSink, FsRepository, JobState};
use ecoportal_ingest::sources::{CombinationSource, DimensionFilter, OccurrenceSource};

/// Serves the same single-folder climate archive for every URL.
struct MockStorage {
    payload: Vec<u8>,
}

impl MockStorage {
    fn new() -> Self {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
        gz.write_all(b"ncols 2\nnrows 2\n0 1\n1 0\n").unwrap();
        let compressed = gz.finish().unwrap();
        writer
            .start_file("layers/bioclim_01.asc.gz", options)
            .unwrap();
        writer.write_all(&compressed).unwrap();
        let payload = writer.finish().unwrap().into_inner();
        Self { payload }
    }
}

impl Fetcher for MockStorage {
    fn download(&self, _url: &str, destination: &Path) -> Result<(), IngestError> {
        fs::write(destination, &self.payload)
            .map_err(|err| IngestError::Filesystem(err.to_string()))
    }
}

fn temp_repo() -> (tempfile::TempDir, FsRepository) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("repo")).unwrap();
    let repo = FsRepository::init(root, false).unwrap();
    (temp, repo)
}

fn single_projection_filter() -> DimensionFilter {
    DimensionFilter {
        emsc: ["RCP85".to_string()].into(),
        gcm: ["cccma-cgcm31".to_string()].into(),
        year: ["2085".to_string(), "current".to_string()].into(),
    }
}

fn climate_family() -> &'static catalog::CombinationSpec {
    catalog::combination_sources()
        .iter()
        .find(|spec| spec.name == "australia-5km")
        .unwrap()
}

#[test]
fn import_creates_objects_and_commits() {
    let (_temp, repo) = temp_repo();
    let queue = DeferredTaskQueue::new();

    let pipeline = Pipeline::new()
        .with_stage(Box::new(CombinationSource::new(
            climate_family(),
            "https://storage.example.org/swift/v1",
            true,
            single_projection_filter(),
        )))
        .with_stage(Box::new(OccurrenceSource::new(
            catalog::occurrence_datasets(),
            true,
        )))
        .with_stage(Box::new(DownloadStage::new(
            Box::new(MockStorage::new()),
            RasterConverter::new("true"),
            NameFilter::default(),
        )))
        .with_stage(Box::new(MetadataUpdateStage::new(
            Some("https://portal.example.org".to_string()),
            Rc::clone(&queue) as Rc<dyn TaskQueue>,
            repo.job_tracker(),
        )));

    let mut sink = ContentSink::new(&repo, 2);
    let report = pipeline.run(&mut sink).unwrap();

    // One projection, the baseline, and two bundled species samples.
    assert_eq!(report.consumed, 4);
    assert_eq!(sink.created(), 4);
    // Two full batches of two.
    assert_eq!(repo.commit_count().unwrap(), 2);

    let objects = repo.list().unwrap();
    assert_eq!(objects.len(), 4);
    let projection = objects
        .iter()
        .find(|object| object.path.contains("RCP85_cccma-cgcm31_2085"))
        .unwrap();
    assert_eq!(projection.state, "published");
    assert_eq!(projection.layermeta.genre, Some(Genre::FutureClimate));
    assert_eq!(
        projection.attachments,
        vec!["RCP85_cccma-cgcm31_2085.zip".to_string()]
    );

    // Every created object was queued for metadata recomputation and left
    // PENDING until the deferred jobs run.
    let jobs = queue.drain();
    assert_eq!(jobs.len(), 4);
    let tracker = repo.job_tracker();
    for job in &jobs {
        assert_eq!(tracker.state(&job.object_path).unwrap(), Some(JobState::Pending));
    }

    let handle = metadata::run_jobs_in_background(repo.root().to_owned(), jobs.clone());
    handle.join().unwrap();
    for job in &jobs {
        assert_eq!(
            tracker.state(&job.object_path).unwrap(),
            Some(JobState::Completed)
        );
    }
    let tech_path = repo
        .root()
        .join(&jobs[0].object_path)
        .join("tech.json");
    assert!(tech_path.as_std_path().exists());
}

#[test]
fn converter_failure_aborts_run_before_commit() {
    let (_temp, repo) = temp_repo();
    let queue = DeferredTaskQueue::new();

    let pipeline = Pipeline::new()
        .with_stage(Box::new(CombinationSource::new(
            climate_family(),
            "https://storage.example.org/swift/v1",
            true,
            single_projection_filter(),
        )))
        .with_stage(Box::new(DownloadStage::new(
            Box::new(MockStorage::new()),
            RasterConverter::new("false"),
            NameFilter::default(),
        )))
        .with_stage(Box::new(MetadataUpdateStage::new(
            Some("https://portal.example.org".to_string()),
            Rc::clone(&queue) as Rc<dyn TaskQueue>,
            repo.job_tracker(),
        )));

    let mut sink = ContentSink::new(&repo, 10);
    let err = pipeline.run(&mut sink).unwrap_err();
    assert!(matches!(err, IngestError::ConversionFailed { .. }));
    assert_eq!(repo.commit_count().unwrap(), 0);
}

#[test]
fn cleanup_after_import_removes_marked_objects() {
    let (_temp, repo) = temp_repo();
    let queue = DeferredTaskQueue::new();

    let pipeline = Pipeline::new()
        .with_stage(Box::new(OccurrenceSource::new(
            catalog::occurrence_datasets(),
            true,
        )))
        .with_stage(Box::new(MetadataUpdateStage::new(
            None,
            Rc::clone(&queue) as Rc<dyn TaskQueue>,
            repo.job_tracker(),
        )));
    let mut sink = ContentSink::new(&repo, 1);
    pipeline.run(&mut sink).unwrap();
    assert!(queue.is_empty());

    let objects = repo.list().unwrap();
    assert_eq!(objects.len(), 2);
    repo.job_tracker()
        .set_state(&objects[0].path, JobState::Removed)
        .unwrap();

    let removed = repo.cleanup().unwrap();
    assert_eq!(removed, 1);
    assert_eq!(repo.list().unwrap().len(), 1);
}

#[test]
fn dry_run_import_needs_no_repository() {
    let config: ResolvedConfig = ConfigLoader::resolve_config(Config::default()).unwrap();
    let options = ImportOptions {
        test: true,
        dry_run: true,
        ..ImportOptions::default()
    };
    let result = app::run_import(&config, &options).unwrap();
    assert!(result.dry_run);
    assert_eq!(result.created, 0);
    assert_eq!(result.jobs_scheduled, 0);
    assert_eq!(result.consumed, 4);
}

#[test]
fn import_against_missing_repository_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let config = ConfigLoader::resolve_config(Config {
        repository: Some(temp.path().join("absent").to_str().unwrap().to_string()),
        ..Config::default()
    })
    .unwrap();
    let options = ImportOptions {
        test: true,
        ..ImportOptions::default()
    };
    let err = app::run_import(&config, &options).unwrap_err();
    assert!(matches!(err, IngestError::RepositoryMissing(_)));
}
