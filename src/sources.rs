use std::collections::BTreeSet;

use tracing::info;

use crate::catalog::{BaselineSpec, CombinationSpec, FixedSourceSpec, OccurrenceSpec, YearRangeSpec};
use crate::domain::{FileAttachment, Genre, LayerMeta, Record, emsc_title};
use crate::error::IngestError;
use crate::pipeline::{RecordStream, Stage};

/// Per-dimension allow-lists applied by the combination generator. An empty
/// set leaves that dimension unconstrained.
#[derive(Debug, Clone, Default)]
pub struct DimensionFilter {
    pub emsc: BTreeSet<String>,
    pub gcm: BTreeSet<String>,
    pub year: BTreeSet<String>,
}

impl DimensionFilter {
    fn keeps(&self, emsc: &str, gcm: &str, year: &str) -> bool {
        (self.emsc.is_empty() || self.emsc.contains(emsc))
            && (self.gcm.is_empty() || self.gcm.contains(gcm))
            && (self.year.is_empty() || self.year.contains(year))
    }

    /// The baseline item is yielded unless a year filter is present that
    /// does not name "current".
    fn keeps_baseline(&self) -> bool {
        self.year.is_empty() || self.year.contains("current")
    }
}

fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Generator over the cross-product of a climate family's emission
/// scenarios, models and years. One configuration record per dataset
/// family; record construction is pure.
pub struct CombinationSource {
    spec: &'static CombinationSpec,
    storage_root: String,
    enabled: bool,
    filter: DimensionFilter,
}

impl CombinationSource {
    pub fn new(
        spec: &'static CombinationSpec,
        storage_root: impl Into<String>,
        enabled: bool,
        filter: DimensionFilter,
    ) -> Self {
        Self {
            spec,
            storage_root: storage_root.into(),
            enabled,
            filter,
        }
    }

    fn combination_record(&self, emsc: &str, gcm: &str, year: &str) -> Result<Record, IngestError> {
        let filename = fill(self.spec.file_template, &[("emsc", emsc), ("gcm", gcm), ("year", year)]);
        let title = fill(
            self.spec.title_template,
            &[
                ("emsc", emsc_title(emsc)?),
                ("gcm", &gcm.to_uppercase()),
                ("year", year),
            ],
        );
        let mut record = Record::remote(
            format!("datasets/climate/{}/{}", self.spec.folder, filename),
            title,
            format!("{}/{}/{}", self.storage_root, self.spec.container, filename),
        );
        record.subject = self.spec.subject.iter().map(|tag| tag.to_string()).collect();
        record.layermeta = LayerMeta {
            genre: Some(Genre::FutureClimate),
            resolution: Some(self.spec.resolution.to_string()),
            emsc: Some(emsc.to_string()),
            gcm: Some(gcm.to_string()),
            rcm: None,
            year: Some(year.to_string()),
            categories: vec!["future".to_string()],
        };
        info!(title = %record.title, "import");
        Ok(record)
    }

    fn baseline_record(&self, baseline: &BaselineSpec) -> Record {
        let mut record = Record::remote(
            format!("datasets/climate/{}/{}", self.spec.folder, baseline.file),
            baseline.title,
            format!("{}/{}/{}", self.storage_root, self.spec.container, baseline.file),
        );
        record.description = Some(baseline.description.to_string());
        record.subject = self
            .spec
            .subject
            .iter()
            .chain(baseline.extra_subject)
            .map(|tag| tag.to_string())
            .collect();
        record.layermeta = LayerMeta {
            genre: Some(Genre::CurrentClimate),
            resolution: Some(self.spec.resolution.to_string()),
            categories: vec!["current".to_string()],
            ..LayerMeta::default()
        };
        info!(title = %record.title, "import");
        record
    }

    fn generate(&self) -> Vec<Result<Record, IngestError>> {
        let mut items = Vec::new();
        for emsc in self.spec.emscs {
            for gcm in self.spec.gcms {
                for year in self.spec.years {
                    if !self.filter.keeps(emsc, gcm, year) {
                        continue;
                    }
                    items.push(self.combination_record(emsc, gcm, year));
                }
            }
        }
        if let Some(baseline) = &self.spec.baseline {
            if self.filter.keeps_baseline() {
                items.push(Ok(self.baseline_record(baseline)));
            }
        }
        items
    }
}

impl Stage for CombinationSource {
    fn name(&self) -> &'static str {
        self.spec.name
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        if !self.enabled {
            return input;
        }
        Box::new(input.chain(self.generate()))
    }
}

/// Generator over a flat table of environmental layers.
pub struct FixedLayerSource {
    spec: &'static FixedSourceSpec,
    storage_root: String,
    enabled: bool,
}

impl FixedLayerSource {
    pub fn new(spec: &'static FixedSourceSpec, storage_root: impl Into<String>, enabled: bool) -> Self {
        Self {
            spec,
            storage_root: storage_root.into(),
            enabled,
        }
    }

    fn generate(&self) -> Vec<Result<Record, IngestError>> {
        self.spec
            .layers
            .iter()
            .map(|layer| {
                let mut record = Record::remote(
                    format!("datasets/{}/{}", layer.folder, layer.file),
                    layer.title,
                    format!("{}/{}/{}", self.storage_root, layer.container, layer.file),
                );
                record.description = layer.description.map(str::to_string);
                record.external_description = layer.external_description.map(str::to_string);
                record.subject = layer.subject.iter().map(|tag| tag.to_string()).collect();
                record.layermeta = LayerMeta {
                    genre: Some(layer.genre),
                    resolution: Some(layer.resolution.to_string()),
                    categories: vec![layer.category.to_string()],
                    ..LayerMeta::default()
                };
                info!(title = %record.title, "import");
                Ok(record)
            })
            .collect()
    }
}

impl Stage for FixedLayerSource {
    fn name(&self) -> &'static str {
        self.spec.name
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        if !self.enabled {
            return input;
        }
        Box::new(input.chain(self.generate()))
    }
}

/// Generator over an annual dataset family spanning a year range.
pub struct YearRangeSource {
    spec: &'static YearRangeSpec,
    storage_root: String,
    enabled: bool,
    years: BTreeSet<String>,
}

impl YearRangeSource {
    pub fn new(
        spec: &'static YearRangeSpec,
        storage_root: impl Into<String>,
        enabled: bool,
        years: BTreeSet<String>,
    ) -> Self {
        Self {
            spec,
            storage_root: storage_root.into(),
            enabled,
            years,
        }
    }

    fn generate(&self) -> Vec<Result<Record, IngestError>> {
        let mut items = Vec::new();
        for year in self.spec.first_year..=self.spec.last_year {
            let year = year.to_string();
            if !self.years.is_empty() && !self.years.contains(&year) {
                continue;
            }
            let filename = fill(self.spec.file_template, &[("year", &year)]);
            let title = fill(self.spec.title_template, &[("year", &year)]);
            let mut record = Record::remote(
                format!("datasets/{}/{}", self.spec.folder, filename),
                title,
                format!("{}/{}/{}", self.storage_root, self.spec.container, filename),
            );
            record.subject = self.spec.subject.iter().map(|tag| tag.to_string()).collect();
            record.layermeta = LayerMeta {
                genre: Some(self.spec.genre),
                resolution: Some(self.spec.resolution.to_string()),
                year: Some(year),
                categories: vec![self.spec.category.to_string()],
                ..LayerMeta::default()
            };
            info!(title = %record.title, "import");
            items.push(Ok(record));
        }
        items
    }
}

impl Stage for YearRangeSource {
    fn name(&self) -> &'static str {
        self.spec.name
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        if !self.enabled {
            return input;
        }
        Box::new(input.chain(self.generate()))
    }
}

/// Generator for species occurrence samples bundled with the binary.
pub struct OccurrenceSource {
    datasets: &'static [OccurrenceSpec],
    enabled: bool,
}

impl OccurrenceSource {
    pub fn new(datasets: &'static [OccurrenceSpec], enabled: bool) -> Self {
        Self { datasets, enabled }
    }

    fn generate(&self) -> Vec<Result<Record, IngestError>> {
        self.datasets
            .iter()
            .map(|spec| {
                let attachment = FileAttachment {
                    filename: "occur.csv".to_string(),
                    content_type: "text/csv".to_string(),
                    data: spec.csv.as_bytes().to_vec(),
                };
                let mut record = Record::embedded(
                    format!("datasets/species/{}", spec.id),
                    format!("Occurrence data for {}", spec.common_name),
                    attachment,
                );
                record.layermeta = LayerMeta {
                    genre: Some(Genre::SpeciesOccurrence),
                    ..LayerMeta::default()
                };
                info!(title = %record.title, "import");
                Ok(record)
            })
            .collect()
    }
}

impl Stage for OccurrenceSource {
    fn name(&self) -> &'static str {
        "species-occurrences"
    }

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream {
        if !self.enabled {
            return input;
        }
        Box::new(input.chain(self.generate()))
    }
}
