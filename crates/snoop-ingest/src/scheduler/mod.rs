//! Scheduler accounting enrichment
//!
//! - `client`: the accounting collaborator (`qstat -fx -F json` or a test fake)
//! - `state`: the closed job-state vocabulary
//! - `enricher`: sequential per-job enrichment with per-job failure isolation

pub mod client;
pub mod enricher;
pub mod state;
pub mod types;

pub use client::{JobAccountingClient, QstatClient};
pub use enricher::{EnrichmentSummary, SchedulerEnricher};
pub use state::JobStateVocabulary;
pub use types::{ResourceList, ResourcesUsed, SchedulerJobInfo};
