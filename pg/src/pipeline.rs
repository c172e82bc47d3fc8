//! Ingest → convert → sink driver
//!
//! The pipeline is the single consumer of a [`RecordStream`]. Rejected records
//! and skipped fields are logged and counted; a sink error stops the run and
//! shuts the reader down.

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::ingest::RecordStream;
use crate::schema::Schema;
use crate::sink::Sink;
use crate::transform::Transformer;

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Non-blank input lines
    pub lines: u64,
    /// Lines that failed to decode
    pub malformed: u64,
    /// Records decoded
    pub records: u64,
    /// Records with no resolvable rule
    pub rejected: u64,
    /// Mutation groups delivered to the sink
    pub groups: u64,
    /// Fields that contributed nothing
    pub skipped_fields: u64,
}

/// Drives records from a stream through the transformer into a sink
pub struct Pipeline<'a> {
    transformer: Transformer<'a>,
    label: Option<String>,
    progress_interval: u64,
}

impl<'a> Pipeline<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            transformer: Transformer::new(schema),
            label: None,
            progress_interval: 0,
        }
    }

    /// Apply `label` to every record instead of its `#label` field
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Log progress every `interval` records (0 disables)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Consume the whole stream
    pub async fn run<S>(&self, mut stream: RecordStream, sink: &mut S) -> Result<PipelineStats>
    where
        S: Sink + ?Sized,
    {
        debug!(label = ?self.label, "Pipeline::run: called");
        let mut stats = PipelineStats::default();

        while let Some(record) = stream.next_record().await {
            stats.records += 1;

            match self.transformer.convert(&record, self.label.as_deref()) {
                Ok(conversion) => {
                    stats.skipped_fields += conversion.skipped().len() as u64;
                    for group in conversion.groups() {
                        if let Err(e) = sink.submit(group).await {
                            stream.shutdown();
                            if let Err(ingest) = stream.finish().await {
                                debug!(error = %ingest, "Pipeline::run: reader also failed");
                            }
                            return Err(e).context(format!("Sink rejected a group from record {}", stats.records));
                        }
                        stats.groups += 1;
                    }
                }
                Err(rejected) => {
                    stats.rejected += 1;
                    warn!(record = stats.records, "Record rejected: {}", rejected);
                }
            }

            if self.progress_interval > 0 && stats.records % self.progress_interval == 0 {
                info!(
                    records = stats.records,
                    groups = stats.groups,
                    rejected = stats.rejected,
                    "Progress"
                );
            }
        }

        sink.finish().await.context("Failed to flush sink")?;
        let ingest = stream.finish().await.context("Failed to read input")?;
        stats.lines = ingest.lines;
        stats.malformed = ingest.malformed;

        info!(
            lines = stats.lines,
            records = stats.records,
            malformed = stats.malformed,
            rejected = stats.rejected,
            groups = stats.groups,
            skipped_fields = stats.skipped_fields,
            "Conversion complete"
        );
        Ok(stats)
    }
}
