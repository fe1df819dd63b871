//! Scheduler accounting collaborator
//!
//! [`QstatClient`] shells out to `qstat -fx -F json <job id>`, the same way the cluster tools do
//! by hand. Tests substitute an in-memory implementation of [`JobAccountingClient`].

use async_trait::async_trait;
use snoop_common::{Result, SnoopError};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::types::{QstatDocument, SchedulerJobInfo};

/// Default accounting command.
pub const DEFAULT_QSTAT: &str = "qstat";

/// Looks up accounting data for one job.
#[async_trait]
pub trait JobAccountingClient: Send + Sync {
    /// One attempt; any failure is a [`SnoopError::SchedulerQuery`] naming `job_id`.
    async fn query(&self, job_id: &str) -> Result<SchedulerJobInfo>;
}

#[derive(Debug, Clone)]
pub struct QstatClient {
    program: String,
    timeout: Option<Duration>,
}

impl Default for QstatClient {
    fn default() -> Self {
        Self::new(DEFAULT_QSTAT)
    }
}

impl QstatClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the query and fail the job if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, job_id: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-fx", "-F", "json", job_id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl JobAccountingClient for QstatClient {
    async fn query(&self, job_id: &str) -> Result<SchedulerJobInfo> {
        debug!(job_id, program = %self.program, "Querying scheduler accounting");

        let mut cmd = self.command(job_id);
        let output = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                SnoopError::scheduler_query(
                    job_id,
                    format!("{} timed out after {}s", self.program, limit.as_secs()),
                )
            })?,
            None => output.await,
        }
        .map_err(|e| {
            SnoopError::scheduler_query(job_id, format!("failed to run {}: {e}", self.program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SnoopError::scheduler_query(
                job_id,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        parse_qstat_json(job_id, &output.stdout)
    }
}

/// Pick `job_id`'s entry out of a `qstat -F json` document.
///
/// A document holding a single job under a different key (e.g. a fully qualified server name)
/// is accepted.
pub fn parse_qstat_json(job_id: &str, body: &[u8]) -> Result<SchedulerJobInfo> {
    let mut document: QstatDocument = serde_json::from_slice(body)
        .map_err(|e| SnoopError::scheduler_query(job_id, format!("invalid response: {e}")))?;

    if let Some(info) = document.jobs.remove(job_id) {
        return Ok(info);
    }

    let mut jobs = document.jobs.into_values();
    match (jobs.next(), jobs.next()) {
        (Some(info), None) => Ok(info),
        (None, _) => Err(SnoopError::scheduler_query(job_id, "response contains no jobs")),
        (Some(_), Some(_)) => Err(SnoopError::scheduler_query(
            job_id,
            "response contains several jobs and none matches",
        )),
    }
}
