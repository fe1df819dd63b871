//! Data models for module-load and per-job records

use serde::{Deserialize, Serialize};

/// One module loaded by one instrumented process.
///
/// Field names double as the column headers of the daily module tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLoadRecord {
    #[serde(rename = "Module")]
    pub module: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Python Executable")]
    pub python_executable: String,
    #[serde(rename = "Ignored")]
    pub ignored: bool,
    #[serde(rename = "Job ID")]
    pub job_id: String,
    #[serde(rename = "Queue")]
    pub queue: String,
    #[serde(rename = "Job Size")]
    pub job_size: String,
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Node Number")]
    pub node_number: String,
    #[serde(rename = "Job Name")]
    pub job_name: String,
    #[serde(rename = "Job Directory")]
    pub job_directory: String,
    #[serde(rename = "PALS Depth")]
    pub pals_depth: String,
    #[serde(rename = "PALS Rank ID")]
    pub pals_rank_id: String,
    #[serde(rename = "PALS Local Rank ID")]
    pub pals_local_rank_id: String,
    #[serde(rename = "PALS Node ID")]
    pub pals_node_id: String,
    #[serde(rename = "PMI Local Rank")]
    pub pmi_local_rank: String,
    #[serde(rename = "PMI Local Size")]
    pub pmi_local_size: String,
    #[serde(rename = "PMI Rank")]
    pub pmi_rank: String,
    #[serde(rename = "PMI Size")]
    pub pmi_size: String,
    #[serde(rename = "Category")]
    pub category: String,
}

/// Fields filled from the scheduler accounting service. All stay `None` when the query fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerFields {
    /// Colon-delimited filesystem names, verbatim
    pub filesystems: Option<String>,
    pub award_category: Option<String>,
    pub walltime_secs: Option<u64>,
    pub nodes: Option<u64>,
    pub runtime_secs: Option<u64>,
    pub exit_status: Option<String>,
    /// Human-readable job state name
    pub job_state: Option<String>,
}

/// One record per distinct Job ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,

    /// Never empty; holds "none" only when that is the sole entry
    pub categories: Vec<String>,

    /// Distinct non-ignored module names in order of first appearance
    pub non_ignored_modules: Vec<String>,

    // Scalars taken from the first module-load record seen for the job
    pub user: String,
    pub hostname: String,
    pub queue: String,
    pub job_size: String,
    pub account: String,
    pub node_number: String,
    pub job_name: String,
    pub job_directory: String,
    pub timestamp: String,
    pub pals_depth: String,
    pub pmi_size: String,
    pub pmi_local_size: String,

    pub scheduler: SchedulerFields,
}

impl JobRecord {
    /// Seed a job from its first module-load record; lists start empty.
    pub fn from_first(record: &ModuleLoadRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            categories: Vec::new(),
            non_ignored_modules: Vec::new(),
            user: record.user.clone(),
            hostname: record.hostname.clone(),
            queue: record.queue.clone(),
            job_size: record.job_size.clone(),
            account: record.account.clone(),
            node_number: record.node_number.clone(),
            job_name: record.job_name.clone(),
            job_directory: record.job_directory.clone(),
            timestamp: record.timestamp.clone(),
            pals_depth: record.pals_depth.clone(),
            pmi_size: record.pmi_size.clone(),
            pmi_local_size: record.pmi_local_size.clone(),
            scheduler: SchedulerFields::default(),
        }
    }
}
