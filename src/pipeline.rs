use tracing::info;

use crate::domain::Record;
use crate::error::IngestError;

/// Lazy, finite, single-consumer stream of records. Errors travel as items
/// so the first failure surfaces at the consumer and aborts the run.
pub type RecordStream = Box<dyn Iterator<Item = Result<Record, IngestError>>>;

/// One transformation step. A stage consumes the upstream stream and
/// produces its own: it may pass records through, mutate them, drop them,
/// or inject new ones. Stage order is fixed by the pipeline builder.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn transform(self: Box<Self>, input: RecordStream) -> RecordStream;
}

/// Terminal consumer of the pipeline. Creating content is a side effect on
/// the repository; records are consumed, not returned.
pub trait Sink {
    fn consume(&mut self, record: Record) -> Result<(), IngestError>;

    /// Called once after the stream is exhausted. Implementations flush any
    /// open commit batch here.
    fn finish(&mut self) -> Result<(), IngestError>;
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RunReport {
    pub consumed: usize,
}

/// An explicit, ordered list of stages. Built by the caller from
/// configuration; there is no registry or discovery.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Thread the stages together over an empty upstream and return the
    /// resulting stream. Consuming the stream drives the whole pipeline.
    pub fn records(self) -> RecordStream {
        let mut stream: RecordStream = Box::new(std::iter::empty());
        for stage in self.stages {
            stream = stage.transform(stream);
        }
        stream
    }

    /// Run to completion, feeding every record into the sink. The first
    /// error from any stage or from the sink aborts the run; there is no
    /// retry and no partial resume.
    pub fn run(self, sink: &mut dyn Sink) -> Result<RunReport, IngestError> {
        let names = self.stage_names().join(" -> ");
        info!(stages = %names, "pipeline start");
        let mut report = RunReport::default();
        for item in self.records() {
            let record = item?;
            sink.consume(record)?;
            report.consumed += 1;
        }
        sink.finish()?;
        info!(consumed = report.consumed, "pipeline done");
        Ok(report)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
