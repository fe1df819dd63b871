//! Parallel log ingestion
//!
//! Runs the extractor over a batch of files on a bounded pool of blocking workers. A file that
//! cannot be read or parsed, or a worker that panics, costs only that file's records.

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::extractor::{Extraction, LogRecordExtractor};
use crate::models::ModuleLoadRecord;

/// Outcome of one file, as reported by its worker.
#[derive(Debug)]
enum FileOutcome {
    Extracted(Vec<ModuleLoadRecord>),
    LoginNode,
    Failed(String),
}

/// A file that contributed nothing because of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Merged result of one batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// All records; files appear in input order, each file's records in file order
    pub records: Vec<ModuleLoadRecord>,
    pub files_extracted: usize,
    pub files_skipped: usize,
    pub failures: Vec<FileFailure>,
    pub duration_seconds: f64,
}

impl IngestReport {
    pub fn files_total(&self) -> usize {
        self.files_extracted + self.files_skipped + self.failures.len()
    }
}

pub struct ParallelIngestor {
    extractor: Arc<LogRecordExtractor>,
    workers: usize,
    progress: Option<ProgressBar>,
}

impl ParallelIngestor {
    /// `workers` is clamped to at least one.
    pub fn new(extractor: LogRecordExtractor, workers: usize) -> Self {
        Self {
            extractor: Arc::new(extractor),
            workers: workers.max(1),
            progress: None,
        }
    }

    /// Tick `progress` once per finished file.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn ingest(&self, paths: Vec<PathBuf>) -> IngestReport {
        let start = Instant::now();
        let total = paths.len();

        info!(files = total, workers = self.workers, "Ingesting log files");
        if let Some(pb) = &self.progress {
            pb.set_length(total as u64);
            pb.set_position(0);
        }

        // `buffered` keeps at most `workers` extractions in flight and yields in input order
        let outcomes: Vec<(PathBuf, FileOutcome)> = stream::iter(paths)
            .map(|path| {
                let extractor = Arc::clone(&self.extractor);
                async move {
                    let task_path = path.clone();
                    let joined =
                        tokio::task::spawn_blocking(move || extractor.extract(&task_path)).await;

                    let outcome = match joined {
                        Ok(Ok(Extraction::Records(records))) => FileOutcome::Extracted(records),
                        Ok(Ok(Extraction::LoginNode)) => FileOutcome::LoginNode,
                        Ok(Err(e)) => {
                            warn!(path = %path.display(), error = %e, "Skipping log file");
                            FileOutcome::Failed(e.to_string())
                        },
                        Err(e) => {
                            error!(path = %path.display(), error = %e, "Extraction worker failed");
                            FileOutcome::Failed(format!("worker failed: {e}"))
                        },
                    };
                    (path, outcome)
                }
            })
            .buffered(self.workers)
            .inspect(|_| {
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
            })
            .collect()
            .await;

        let mut report = IngestReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                FileOutcome::Extracted(records) => {
                    report.files_extracted += 1;
                    report.records.extend(records);
                },
                FileOutcome::LoginNode => report.files_skipped += 1,
                FileOutcome::Failed(reason) => report.failures.push(FileFailure { path, reason }),
            }
        }
        report.duration_seconds = start.elapsed().as_secs_f64();

        info!(
            files = total,
            extracted = report.files_extracted,
            skipped = report.files_skipped,
            failed = report.failures.len(),
            records = report.records.len(),
            "Ingestion complete in {:.2}s",
            report.duration_seconds
        );

        report
    }
}
