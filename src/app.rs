use std::collections::BTreeSet;
use std::rc::Rc;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog;
use crate::config::ResolvedConfig;
use crate::domain::Record;
use crate::error::IngestError;
use crate::materialize::{DownloadStage, Fetcher, HttpFetcher, NameFilter, RasterConverter};
use crate::metadata::{DeferredTaskQueue, MetadataUpdateStage, TaskQueue, run_jobs_in_background};
use crate::pipeline::{Pipeline, Sink};
use crate::repository::{ContentSink, FsRepository};
use crate::sources::{
    CombinationSource, DimensionFilter, FixedLayerSource, OccurrenceSource, YearRangeSource,
};

/// Smoke-test selection: one climate family and the bundled species data,
/// narrowed to a single projection unless the caller filtered already.
const TEST_SOURCES: [&str; 2] = ["australia-5km", "species-occurrences"];
const TEST_GCM: &str = "cccma-cgcm31";
const TEST_EMSC: &str = "RCP85";
const TEST_YEAR: &str = "2085";

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub test: bool,
    pub all: bool,
    pub sources: Vec<String>,
    pub gcm: Vec<String>,
    pub emsc: Vec<String>,
    pub year: Vec<String>,
    pub site_url: Option<String>,
    pub commit_every: Option<usize>,
    pub converter: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub sources: Vec<String>,
    pub consumed: usize,
    pub created: usize,
    pub jobs_scheduled: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResult {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub datasets: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub path: String,
    pub title: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

/// Resolve which generator sources the run enables.
fn enabled_sources(
    config: &ResolvedConfig,
    options: &ImportOptions,
) -> Result<BTreeSet<String>, IngestError> {
    let known = catalog::source_names();
    for requested in &options.sources {
        if !known.contains(&requested.as_str()) {
            return Err(IngestError::UnknownSource(requested.clone()));
        }
    }
    if options.all {
        return Ok(known.into_iter().map(str::to_string).collect());
    }
    if options.test {
        return Ok(TEST_SOURCES.iter().map(|name| name.to_string()).collect());
    }
    let mut enabled: BTreeSet<String> = config.sources.iter().cloned().collect();
    enabled.extend(options.sources.iter().cloned());
    Ok(enabled)
}

fn dimension_filter(options: &ImportOptions) -> DimensionFilter {
    let mut filter = DimensionFilter {
        emsc: options.emsc.iter().cloned().collect(),
        gcm: options.gcm.iter().cloned().collect(),
        year: options.year.iter().cloned().collect(),
    };
    // Test mode narrows unfiltered dimensions to a single projection so a
    // smoke run touches one archive per family.
    if options.test {
        if filter.emsc.is_empty() {
            filter.emsc.insert(TEST_EMSC.to_string());
        }
        if filter.gcm.is_empty() {
            filter.gcm.insert(TEST_GCM.to_string());
        }
        if filter.year.is_empty() {
            filter.year.insert(TEST_YEAR.to_string());
            filter.year.insert("current".to_string());
        }
    }
    filter
}

fn name_filter(filter: &DimensionFilter) -> NameFilter {
    NameFilter {
        gcm: filter.gcm.iter().cloned().collect(),
        emsc: filter.emsc.iter().cloned().collect(),
        year: filter.year.iter().cloned().collect(),
    }
}

/// Assemble the generator stages in catalog order. Disabled sources are
/// still present as exact pass-throughs, matching their stage contract.
fn generator_pipeline(
    config: &ResolvedConfig,
    enabled: &BTreeSet<String>,
    filter: &DimensionFilter,
) -> Pipeline {
    let mut pipeline = Pipeline::new();
    for spec in catalog::combination_sources() {
        pipeline = pipeline.with_stage(Box::new(CombinationSource::new(
            spec,
            config.storage_root.clone(),
            enabled.contains(spec.name),
            filter.clone(),
        )));
    }
    for spec in catalog::fixed_sources() {
        pipeline = pipeline.with_stage(Box::new(FixedLayerSource::new(
            spec,
            config.storage_root.clone(),
            enabled.contains(spec.name),
        )));
    }
    for spec in catalog::year_range_sources() {
        pipeline = pipeline.with_stage(Box::new(YearRangeSource::new(
            spec,
            config.storage_root.clone(),
            enabled.contains(spec.name),
            filter.year.clone(),
        )));
    }
    pipeline.with_stage(Box::new(OccurrenceSource::new(
        catalog::occurrence_datasets(),
        enabled.contains("species-occurrences"),
    )))
}

/// Counts and logs what a real run would import; never touches the network
/// or the repository.
#[derive(Default)]
struct DryRunSink {
    consumed: usize,
}

impl Sink for DryRunSink {
    fn consume(&mut self, record: Record) -> Result<(), IngestError> {
        info!(path = %record.path, title = %record.title, "dry-run");
        self.consumed += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        Ok(())
    }
}

pub fn run_import(
    config: &ResolvedConfig,
    options: &ImportOptions,
) -> Result<ImportResult, IngestError> {
    let enabled = enabled_sources(config, options)?;
    let filter = dimension_filter(options);
    let source_list: Vec<String> = enabled.iter().cloned().collect();

    if options.dry_run {
        let pipeline = generator_pipeline(config, &enabled, &filter);
        let mut sink = DryRunSink::default();
        let report = pipeline.run(&mut sink)?;
        return Ok(ImportResult {
            sources: source_list,
            consumed: report.consumed,
            created: 0,
            jobs_scheduled: 0,
            dry_run: true,
        });
    }

    let repo = FsRepository::open(config.repository.as_str())?;
    let fetcher: Box<dyn Fetcher> = Box::new(HttpFetcher::new()?);
    let converter = RasterConverter::new(
        options
            .converter
            .clone()
            .unwrap_or_else(|| config.converter.clone()),
    );
    let queue = DeferredTaskQueue::new();
    let site_url = options.site_url.clone().or_else(|| config.site_url.clone());

    let pipeline = generator_pipeline(config, &enabled, &filter)
        .with_stage(Box::new(DownloadStage::new(
            fetcher,
            converter,
            name_filter(&filter),
        )))
        .with_stage(Box::new(MetadataUpdateStage::new(
            site_url,
            Rc::clone(&queue) as Rc<dyn TaskQueue>,
            repo.job_tracker(),
        )));

    let commit_every = options.commit_every.unwrap_or(config.commit_every).max(1);
    let mut sink = ContentSink::new(&repo, commit_every);
    let report = pipeline.run(&mut sink)?;
    let created = sink.created();

    // Deferred metadata jobs run only after the final commit has landed.
    let jobs = queue.drain();
    let jobs_scheduled = jobs.len();
    if !jobs.is_empty() {
        let handle = run_jobs_in_background(repo.root().to_owned(), jobs);
        if handle.join().is_err() {
            warn!("metadata job worker panicked");
        }
    }

    Ok(ImportResult {
        sources: source_list,
        consumed: report.consumed,
        created,
        jobs_scheduled,
        dry_run: false,
    })
}

pub fn run_init(root: &str, replace: bool) -> Result<FsRepository, IngestError> {
    FsRepository::init(root, replace)
}

pub fn run_cleanup(config: &ResolvedConfig) -> Result<CleanupResult, IngestError> {
    let repo = FsRepository::open(config.repository.as_str())?;
    let removed = repo.cleanup()?;
    Ok(CleanupResult { removed })
}

pub fn run_list(config: &ResolvedConfig) -> Result<ListResult, IngestError> {
    let repo = FsRepository::open(config.repository.as_str())?;
    let datasets = repo
        .list()?
        .into_iter()
        .map(|object| ListEntry {
            path: object.path,
            title: object.title,
            state: object.state,
            genre: object.layermeta.genre.map(|genre| genre.to_string()),
        })
        .collect();
    Ok(ListResult { datasets })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::{Config, ConfigLoader};

    fn base_config() -> ResolvedConfig {
        ConfigLoader::resolve_config(Config::default()).unwrap()
    }

    #[test]
    fn unknown_source_is_usage_error() {
        let options = ImportOptions {
            sources: vec!["atlantis-10km".to_string()],
            ..ImportOptions::default()
        };
        assert_matches!(
            enabled_sources(&base_config(), &options),
            Err(IngestError::UnknownSource(_))
        );
    }

    #[test]
    fn all_flag_enables_every_source() {
        let options = ImportOptions {
            all: true,
            ..ImportOptions::default()
        };
        let enabled = enabled_sources(&base_config(), &options).unwrap();
        assert_eq!(enabled.len(), catalog::source_names().len());
    }

    #[test]
    fn test_mode_narrows_dimensions() {
        let options = ImportOptions {
            test: true,
            ..ImportOptions::default()
        };
        let enabled = enabled_sources(&base_config(), &options).unwrap();
        assert!(enabled.contains("australia-5km"));
        assert!(enabled.contains("species-occurrences"));

        let filter = dimension_filter(&options);
        assert!(filter.gcm.contains(TEST_GCM));
        assert!(filter.year.contains("current"));
    }

    #[test]
    fn explicit_filters_survive_test_mode() {
        let options = ImportOptions {
            test: true,
            gcm: vec!["ukmo-hadcm3".to_string()],
            ..ImportOptions::default()
        };
        let filter = dimension_filter(&options);
        assert_eq!(filter.gcm.len(), 1);
        assert!(filter.gcm.contains("ukmo-hadcm3"));
    }

    #[test]
    fn dry_run_counts_without_repository() {
        let config = base_config();
        let options = ImportOptions {
            test: true,
            dry_run: true,
            ..ImportOptions::default()
        };
        // No repository exists; a dry run must not need one.
        let result = run_import(&config, &options).unwrap();
        assert!(result.dry_run);
        // One projection record, the baseline, and two species samples.
        assert_eq!(result.consumed, 4);
        assert_eq!(result.created, 0);
    }
}
