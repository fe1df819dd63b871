//! Pipeline configuration
//!
//! Values come from `SNOOP_*` environment variables (an optional `.env` is loaded by the binary
//! first); CLI flags override them before [`PipelineConfig::validate`] runs.

use anyhow::Context;
use std::time::Duration;

use crate::extractor::DEFAULT_LOGIN_MARKER;
use crate::scheduler::client::DEFAULT_QSTAT;
use crate::scheduler::state::parse_extensions;
use crate::scheduler::JobStateVocabulary;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_OUTPUT_POSTFIX: &str = "_byjob";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Size of the extraction worker pool
    pub workers: usize,
    /// Scheduler accounting command
    pub qstat_bin: String,
    /// Per-query timeout in seconds; 0 waits for the command to exit on its own
    pub scheduler_timeout_secs: u64,
    /// Hostname substring identifying login nodes
    pub login_marker: String,
    /// Appended to a module table's stem to name its job table
    pub output_postfix: String,
    /// Site-specific job state codes, `CODE=Name` pairs separated by commas
    pub extra_job_states: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            qstat_bin: DEFAULT_QSTAT.to_string(),
            scheduler_timeout_secs: 0,
            login_marker: DEFAULT_LOGIN_MARKER.to_string(),
            output_postfix: DEFAULT_OUTPUT_POSTFIX.to_string(),
            extra_job_states: String::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if it is set.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let workers = match lookup("SNOOP_WORKERS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid SNOOP_WORKERS: {v}"))?,
            None => defaults.workers,
        };
        let scheduler_timeout_secs = match lookup("SNOOP_SCHEDULER_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid SNOOP_SCHEDULER_TIMEOUT_SECS: {v}"))?,
            None => defaults.scheduler_timeout_secs,
        };

        let config = Self {
            workers,
            qstat_bin: lookup("SNOOP_QSTAT_BIN").unwrap_or(defaults.qstat_bin),
            scheduler_timeout_secs,
            login_marker: lookup("SNOOP_LOGIN_MARKER").unwrap_or(defaults.login_marker),
            output_postfix: lookup("SNOOP_OUTPUT_POSTFIX").unwrap_or(defaults.output_postfix),
            extra_job_states: lookup("SNOOP_EXTRA_JOB_STATES").unwrap_or(defaults.extra_job_states),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("SNOOP_WORKERS must be greater than 0");
        }
        if self.qstat_bin.trim().is_empty() {
            anyhow::bail!("SNOOP_QSTAT_BIN must not be empty");
        }
        if self.login_marker.is_empty() {
            anyhow::bail!("SNOOP_LOGIN_MARKER must not be empty");
        }
        if self.output_postfix.is_empty() {
            // the job table would overwrite its own input
            anyhow::bail!("SNOOP_OUTPUT_POSTFIX must not be empty");
        }
        self.job_states()?;
        Ok(())
    }

    /// Per-query scheduler timeout, if any
    pub fn scheduler_timeout(&self) -> Option<Duration> {
        (self.scheduler_timeout_secs > 0).then(|| Duration::from_secs(self.scheduler_timeout_secs))
    }

    /// Built-in job states plus the configured extensions
    pub fn job_states(&self) -> anyhow::Result<JobStateVocabulary> {
        let extensions = parse_extensions(&self.extra_job_states)?;
        JobStateVocabulary::default()
            .with_extensions(extensions)
            .context("Invalid SNOOP_EXTRA_JOB_STATES")
    }
}
