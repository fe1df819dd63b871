//! Per-job scheduler enrichment
//!
//! Jobs are queried one at a time, in the order given. A failed query leaves that job's
//! scheduler fields empty and moves on.

use serde_json::Value;
use snoop_common::{Result, SnoopError, NOT_APPLICABLE};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::client::JobAccountingClient;
use super::state::JobStateVocabulary;
use super::types::SchedulerJobInfo;
use crate::attribution::value_text;
use crate::duration::{elapsed_seconds, parse_duration};
use crate::models::{JobRecord, SchedulerFields};

/// Counts for one enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    /// Query failed; all scheduler fields left empty
    pub failed: usize,
    /// Enriched, but the job state code was not recognized
    pub unknown_state: usize,
    /// No real Job ID to query
    pub skipped: usize,
    pub duration_seconds: f64,
}

pub struct SchedulerEnricher<C> {
    client: C,
    states: JobStateVocabulary,
}

impl<C: JobAccountingClient> SchedulerEnricher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            states: JobStateVocabulary::default(),
        }
    }

    pub fn with_states(mut self, states: JobStateVocabulary) -> Self {
        self.states = states;
        self
    }

    /// Enrich every job in place, sequentially.
    pub async fn enrich_all(&self, jobs: &mut [JobRecord]) -> EnrichmentSummary {
        let start = Instant::now();
        let mut summary = EnrichmentSummary::default();

        info!(jobs = jobs.len(), "Enriching jobs from scheduler accounting");

        for job in jobs.iter_mut() {
            if job.job_id == NOT_APPLICABLE {
                debug!("Skipping scheduler query for unattributed records");
                summary.skipped += 1;
                continue;
            }

            match self.enrich(job).await {
                Ok(()) => summary.enriched += 1,
                Err(e @ SnoopError::UnknownJobState { .. }) => {
                    warn!(job_id = %job.job_id, error = %e, "Job state left empty");
                    summary.enriched += 1;
                    summary.unknown_state += 1;
                },
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "Scheduler query failed");
                    summary.failed += 1;
                },
            }
        }

        summary.duration_seconds = start.elapsed().as_secs_f64();
        info!(
            enriched = summary.enriched,
            failed = summary.failed,
            unknown_state = summary.unknown_state,
            skipped = summary.skipped,
            "Enrichment complete in {:.2}s",
            summary.duration_seconds
        );

        summary
    }

    /// Query one job and fill its scheduler fields.
    ///
    /// On a query failure nothing is written. On an unknown state code every other field is
    /// written and the error is returned.
    pub async fn enrich(&self, job: &mut JobRecord) -> Result<()> {
        let info = self.client.query(&job.job_id).await?;
        let (fields, state) = self.normalize(&job.job_id, &info);
        job.scheduler = fields;
        state
    }

    /// Convert a raw accounting object. The second value reports an unrecognized state code.
    pub fn normalize(
        &self,
        job_id: &str,
        info: &SchedulerJobInfo,
    ) -> (SchedulerFields, Result<()>) {
        let resources = &info.resource_list;

        let runtime_secs = match info.resources_used.walltime.as_deref() {
            Some(used) => parse_duration(Some(used)),
            None => {
                let start = info.stime.as_ref().map(value_text);
                let end = info.obittime.as_ref().map(value_text);
                elapsed_seconds(start.as_deref(), end.as_deref())
            },
        };

        let (job_state, state) = match info.job_state.as_deref() {
            Some(code) => match self.states.name(job_id, code) {
                Ok(name) => (Some(name.to_string()), Ok(())),
                Err(e) => (None, Err(e)),
            },
            None => (None, Ok(())),
        };

        let fields = SchedulerFields {
            filesystems: resources.filesystems.clone(),
            award_category: resources.award_category.clone(),
            walltime_secs: Some(parse_duration(resources.walltime.as_deref())),
            nodes: resources.select.as_ref().and_then(node_count),
            runtime_secs: Some(runtime_secs),
            exit_status: info.exit_status.as_ref().map(value_text),
            job_state,
        };

        (fields, state)
    }
}

/// Leading node count of a select statement (`"4:ncpus=64"` -> 4), or a plain number.
fn node_count(select: &Value) -> Option<u64> {
    match select {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.split(':').next()?.trim().parse().ok(),
        _ => None,
    }
}
