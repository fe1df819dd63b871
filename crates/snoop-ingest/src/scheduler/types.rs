//! Raw accounting objects as returned by the scheduler

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Accounting data for one job. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchedulerJobInfo {
    #[serde(rename = "Resource_List", default)]
    pub resource_list: ResourceList,
    #[serde(default)]
    pub resources_used: ResourcesUsed,
    /// Start time, as a date string or epoch seconds
    #[serde(default)]
    pub stime: Option<Value>,
    #[serde(default)]
    pub obittime: Option<Value>,
    #[serde(rename = "Exit_status", default)]
    pub exit_status: Option<Value>,
    #[serde(default)]
    pub job_state: Option<String>,
}

/// Requested resources.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub filesystems: Option<String>,
    #[serde(default)]
    pub award_category: Option<String>,
    #[serde(default)]
    pub walltime: Option<String>,
    /// Either a select statement such as `"4:ncpus=64"` or a plain node count
    #[serde(default)]
    pub select: Option<Value>,
}

/// Measured usage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourcesUsed {
    #[serde(default)]
    pub walltime: Option<String>,
}

/// Top-level `qstat -F json` document.
#[derive(Debug, Deserialize)]
pub(crate) struct QstatDocument {
    #[serde(rename = "Jobs", default)]
    pub jobs: BTreeMap<String, SchedulerJobInfo>,
}
