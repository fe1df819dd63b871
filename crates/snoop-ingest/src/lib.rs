//! Module Snooper Ingest Library
//!
//! Turns per-process module snooper logs from an HPC cluster into one accounting record per
//! scheduler job.
//!
//! # Pipeline
//!
//! - **Extraction**: [`LogRecordExtractor`] parses one log file into module-load records,
//!   attributing each to a job through PBS, Cobalt or MPI environment variables
//! - **Ingestion**: [`ParallelIngestor`] runs the extractor over a day of files on a bounded
//!   worker pool; one bad file never aborts the batch
//! - **Aggregation**: [`JobAggregator`] folds module-load records into one [`JobRecord`] per Job ID
//! - **Enrichment**: [`SchedulerEnricher`] fills scheduler accounting fields job by job
//!
//! # Example
//!
//! ```no_run
//! use snoop_ingest::{
//!     CategoryMap, IgnoreSet, JobAggregator, LogRecordExtractor, ParallelIngestor, QstatClient,
//!     SchedulerEnricher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let extractor = LogRecordExtractor::new(
//!         IgnoreSet::from_file("ignore.json")?,
//!         CategoryMap::from_file("categories.json")?,
//!     );
//!     let report = ParallelIngestor::new(extractor, 8)
//!         .ingest(snoop_ingest::pipeline::log_files("logs/2023/07/01".as_ref())?)
//!         .await;
//!
//!     let mut jobs = JobAggregator::aggregate(&report.records);
//!     SchedulerEnricher::new(QstatClient::default()).enrich_all(&mut jobs).await;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod attribution;
pub mod catalog;
pub mod config;
pub mod duration;
pub mod extractor;
pub mod ingestor;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod scheduler;

pub use aggregator::JobAggregator;
pub use catalog::{CategoryMap, IgnoreSet};
pub use config::PipelineConfig;
pub use extractor::{Extraction, LogRecordExtractor};
pub use ingestor::{IngestReport, ParallelIngestor};
pub use models::{JobRecord, ModuleLoadRecord, SchedulerFields};
pub use scheduler::{JobAccountingClient, QstatClient, SchedulerEnricher};
