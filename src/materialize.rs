use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::domain::{ContentType, FileAttachment, Record};
use crate::error::IngestError;
use crate::fs_util;
use crate::pipeline::{RecordStream, Stage};

/// Blocking download seam. The stage never retries: a failed fetch is a
/// failed run.
pub trait Fetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), IngestError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("eco-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::FetchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| IngestError::FetchHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), IngestError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| IngestError::FetchHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(IngestError::FetchStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let mut file = fs::File::create(destination)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// External raster-conversion command. Invoked once per `.asc` grid with the
/// fixed argument shape `<program> -of GTiff <src> <src>.tif`; any non-zero
/// exit is fatal for the run.
#[derive(Debug, Clone)]
pub struct RasterConverter {
    program: PathBuf,
}

impl RasterConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn convert(&self, raster: &Path) -> Result<(), IngestError> {
        let target = raster.with_extension("tif");
        let output = Command::new(&self.program)
            .arg("-of")
            .arg("GTiff")
            .arg(raster)
            .arg(&target)
            .output()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    IngestError::MissingConverter(self.program.display().to_string())
                }
                _ => IngestError::Filesystem(err.to_string()),
            })?;
        if !output.status.success() {
            return Err(IngestError::ConversionFailed {
                path: raster.display().to_string(),
                code: output.status.code().unwrap_or(-1),
            });
        }
        // Drop the source grid only once the converted file is in place.
        if target.exists() {
            fs::remove_file(raster).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

/// Allow-lists matched as substrings of the record's file name. An empty
/// list leaves that dimension unconstrained; a non-matching record is
/// dropped without materialization.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    pub gcm: Vec<String>,
    pub emsc: Vec<String>,
    pub year: Vec<String>,
}

impl NameFilter {
    fn keeps(&self, filename: &str) -> bool {
        let name = filename.to_lowercase();
        let matches = |values: &[String]| {
            values.is_empty() || values.iter().any(|value| name.contains(&value.to_lowercase()))
        };
        matches(&self.gcm) && matches(&self.emsc) && matches(&self.year)
    }
}

/// Materializes remote records: fetch into a scoped temp directory,
/// normalize the archive (extract, gunzip nested rasters, convert grids,
/// re-zip), attach the result, fan out one record per bundled sub-folder.
/// Records without a remote URL pass through untouched.
pub struct DownloadStage {
    fetcher: Box<dyn Fetcher>,
    converter: RasterConverter,
    filter: NameFilter,
}

impl DownloadStage {
    pub fn new(fetcher: Box<dyn Fetcher>, converter: RasterConverter, filter: NameFilter) -> Self {
        Self {
            fetcher,
            converter,
            filter,
        }
    }

    fn materialize(&self, record: Record, url: &str) -> Result<Vec<Record>, IngestError> {
        let filename = record.filename()?.to_string();
        // TempDir is removed when this scope exits, on success and on error.
        let workdir = tempfile::tempdir().map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let download_path = workdir.path().join(&filename);
        info!(url, "fetch");
        self.fetcher.download(url, &download_path)?;

        if !filename.ends_with(".zip") {
            let data =
                fs::read(&download_path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
            let mut record = record;
            attach_payload(&mut record, filename, data);
            return Ok(vec![record]);
        }

        let extract_dir = workdir.path().join("extract");
        fs_util::extract_zip(&download_path, &extract_dir)?;
        self.normalize_rasters(&extract_dir)?;

        let folders = fs_util::sub_directories(&extract_dir)?;
        if folders.is_empty() {
            return Err(IngestError::Archive(format!(
                "archive {filename} contains no dataset folder"
            )));
        }

        if let [folder] = folders.as_slice() {
            let data = fs_util::zip_directory(folder)?;
            let mut record = record;
            attach_payload(&mut record, filename, data);
            return Ok(vec![record]);
        }

        // Multi-folder bundle: one output record per sub-folder.
        let mut out = Vec::with_capacity(folders.len());
        for folder in &folders {
            let folder_name = folder
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| IngestError::Archive("unnamed archive folder".to_string()))?;
            let data = fs_util::zip_directory(folder)?;
            let mut record = record.clone();
            let parent = record
                .path
                .rsplit_once('/')
                .map(|(parent, _)| parent.to_string())
                .unwrap_or_default();
            record.path = format!("{parent}/{folder_name}.zip");
            record.title = format!("{} - {folder_name}", record.title);
            attach_payload(&mut record, format!("{folder_name}.zip"), data);
            out.push(record);
        }
        Ok(out)
    }

    fn normalize_rasters(&self, dir: &Path) -> Result<(), IngestError> {
        let mut files = Vec::new();
        collect(dir, &mut files)?;
        for path in files {
            let name = path.to_string_lossy().into_owned();
            let path = if name.ends_with(".gz") {
                fs_util::gunzip_file(&path)?
            } else {
                path
            };
            if path.extension().is_some_and(|ext| ext == "asc") {
                debug!(path = %path.display(), "convert raster");
                self.converter.convert(&path)?;
            }
        }
        Ok(())
    }
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let entries = fs::read_dir(dir).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn attach_payload(record: &mut Record, filename: String, data: Vec<u8>) {
    let content_type = record
        .format
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    record.attachments.insert(
        "file".to_string(),
        FileAttachment {
            filename,
            content_type,
            data,
        },
    );
    record.content_type = ContentType::Dataset;
}

impl Stage for DownloadStage {
    fn name(&self) -> &'static str {
        "download"
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        let stage = *self;
        Box::new(input.flat_map(move |item| -> Vec<Result<Record, IngestError>> {
            let record = match item {
                Ok(record) => record,
                Err(err) => return vec![Err(err)],
            };
            let Some(url) = record.remote_url.clone() else {
                return vec![Ok(record)];
            };
            let filename = match record.filename() {
                Ok(filename) => filename,
                Err(err) => return vec![Err(err)],
            };
            if !stage.filter.keeps(filename) {
                debug!(path = %record.path, "filtered out");
                return vec![];
            }
            match stage.materialize(record, &url) {
                Ok(records) => records.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    /// Writes a prepared zip to the destination and remembers where the
    /// stage asked it to write.
    struct CannedFetcher {
        payload: Vec<u8>,
        destinations: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl Fetcher for CannedFetcher {
        fn download(&self, _url: &str, destination: &Path) -> Result<(), IngestError> {
            self.destinations.borrow_mut().push(destination.to_path_buf());
            fs::write(destination, &self.payload)
                .map_err(|err| IngestError::Filesystem(err.to_string()))
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn download(&self, url: &str, _destination: &Path) -> Result<(), IngestError> {
            Err(IngestError::FetchStatus {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn bundle_zip(folders: &[&str]) -> Vec<u8> {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("bundle");
        for folder in folders {
            let dir = root.join(folder);
            fs::create_dir_all(&dir).unwrap();
            let gz = dir.join("layer.asc.gz");
            let mut encoder = GzEncoder::new(fs::File::create(&gz).unwrap(), Compression::fast());
            encoder.write_all(b"ncols 2\nnrows 2\n").unwrap();
            encoder.finish().unwrap();
        }
        // Re-zip without the synthetic "bundle" prefix so top-level entries
        // are the dataset folders themselves.
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for folder in folders {
            writer
                .start_file(format!("{folder}/layer.asc.gz"), options)
                .unwrap();
            writer
                .write_all(&fs::read(root.join(folder).join("layer.asc.gz")).unwrap())
                .unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn run_stage(stage: DownloadStage, records: Vec<Record>) -> Vec<Result<Record, IngestError>> {
        let input: RecordStream = Box::new(records.into_iter().map(Ok));
        Box::new(stage).transform(input).collect()
    }

    #[test]
    fn record_without_url_passes_through() {
        let stage = DownloadStage::new(
            Box::new(FailingFetcher),
            RasterConverter::new("true"),
            NameFilter::default(),
        );
        let attachment = FileAttachment {
            filename: "occur.csv".to_string(),
            content_type: "text/csv".to_string(),
            data: b"species,lon,lat\n".to_vec(),
        };
        let record = Record::embedded("datasets/species/koala", "Koala", attachment);
        let out = run_stage(stage, vec![record.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), &record);
    }

    #[test]
    fn filtered_record_is_dropped_without_fetch() {
        let filter = NameFilter {
            year: vec!["2085".to_string()],
            ..NameFilter::default()
        };
        // FailingFetcher proves the fetch is never attempted.
        let stage = DownloadStage::new(Box::new(FailingFetcher), RasterConverter::new("true"), filter);
        let record = Record::remote(
            "datasets/climate/aus5km/RCP85_echam5_2035.zip",
            "x",
            "https://exmpl/RCP85_echam5_2035.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert!(out.is_empty());
    }

    #[test]
    fn temp_directory_removed_after_success() {
        let destinations = Rc::new(RefCell::new(Vec::new()));
        let fetcher = CannedFetcher {
            payload: bundle_zip(&["current"]),
            destinations: Rc::clone(&destinations),
        };
        let stage = DownloadStage::new(
            Box::new(fetcher),
            RasterConverter::new("true"),
            NameFilter::default(),
        );
        let record = Record::remote(
            "datasets/climate/aus5km/current.zip",
            "Current",
            "https://exmpl/current.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert_eq!(out.len(), 1);
        let produced = out[0].as_ref().unwrap();
        assert!(produced.attachments.contains_key("file"));
        assert_eq!(produced.content_type, ContentType::Dataset);

        let destinations = destinations.borrow();
        assert_eq!(destinations.len(), 1);
        assert!(!destinations[0].parent().unwrap().exists());
    }

    #[test]
    fn temp_directory_removed_after_converter_failure() {
        let destinations = Rc::new(RefCell::new(Vec::new()));
        let fetcher = CannedFetcher {
            payload: bundle_zip(&["current"]),
            destinations: Rc::clone(&destinations),
        };
        let stage = DownloadStage::new(
            Box::new(fetcher),
            RasterConverter::new("false"),
            NameFilter::default(),
        );
        let record = Record::remote(
            "datasets/climate/aus5km/current.zip",
            "Current",
            "https://exmpl/current.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert_eq!(out.len(), 1);
        assert_matches!(out[0], Err(IngestError::ConversionFailed { .. }));

        let destinations = destinations.borrow();
        assert!(!destinations[0].parent().unwrap().exists());
    }

    #[test]
    fn missing_converter_is_distinct_error() {
        let destinations = Rc::new(RefCell::new(Vec::new()));
        let fetcher = CannedFetcher {
            payload: bundle_zip(&["current"]),
            destinations: Rc::clone(&destinations),
        };
        let stage = DownloadStage::new(
            Box::new(fetcher),
            RasterConverter::new("eco-ingest-no-such-converter"),
            NameFilter::default(),
        );
        let record = Record::remote(
            "datasets/climate/aus5km/current.zip",
            "Current",
            "https://exmpl/current.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert_matches!(out[0], Err(IngestError::MissingConverter(_)));
    }

    #[test]
    fn multi_folder_archive_fans_out() {
        let destinations = Rc::new(RefCell::new(Vec::new()));
        let fetcher = CannedFetcher {
            payload: bundle_zip(&["ndlc-2004", "ndlc-2008"]),
            destinations: Rc::clone(&destinations),
        };
        let stage = DownloadStage::new(
            Box::new(fetcher),
            RasterConverter::new("true"),
            NameFilter::default(),
        );
        let record = Record::remote(
            "datasets/environmental/ndlc.zip",
            "National Land Cover",
            "https://exmpl/ndlc.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert_eq!(out.len(), 2);
        let first = out[0].as_ref().unwrap();
        let second = out[1].as_ref().unwrap();
        assert_eq!(first.path, "datasets/environmental/ndlc-2004.zip");
        assert_eq!(second.path, "datasets/environmental/ndlc-2008.zip");
        assert!(first.title.ends_with("ndlc-2004"));
        assert!(first.attachments.contains_key("file"));
    }

    #[test]
    fn failed_fetch_is_fatal() {
        let stage = DownloadStage::new(
            Box::new(FailingFetcher),
            RasterConverter::new("true"),
            NameFilter::default(),
        );
        let record = Record::remote(
            "datasets/climate/aus5km/current.zip",
            "Current",
            "https://exmpl/current.zip",
        );
        let out = run_stage(stage, vec![record]);
        assert_matches!(out[0], Err(IngestError::FetchStatus { status: 404, .. }));
    }
}
