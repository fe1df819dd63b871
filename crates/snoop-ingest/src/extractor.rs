//! Log file extraction
//!
//! Turns one module snooper log file into module-load records:
//!
//! ```json
//! {"versions": {"numpy": "1.24.3"}, "env": {"PBS_JOBID": "123.pbs"},
//!  "hostname": "x3005c0s7b0n0", "timestamp": "2023-07-01T10:00:00",
//!  "sys.executable": "/usr/bin/python3"}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use snoop_common::{Result, SnoopError, NOT_APPLICABLE};
use std::path::Path;
use tracing::{debug, trace};

use crate::attribution::{self, value_text, AttributionStrategy, EnvView};
use crate::catalog::{CategoryMap, IgnoreSet};
use crate::models::ModuleLoadRecord;

/// Hostname substring that marks an interactive login node.
pub const DEFAULT_LOGIN_MARKER: &str = "login";

/// MPI world-size variables, most specific first.
const JOB_SIZE_VARS: [&str; 4] = ["PMI_SIZE", "WORLD_SIZE", "NRANKS", "NUMRANKS"];

#[derive(Debug, Deserialize)]
struct SnoopLog {
    versions: Map<String, Value>,
    env: Map<String, Value>,
    hostname: String,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(rename = "sys.executable", default)]
    executable: Option<Value>,
}

/// What one log file contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// One record per module, in file order. May be empty.
    Records(Vec<ModuleLoadRecord>),
    /// A run on a login node with no scheduler job; dropped without error.
    LoginNode,
}

impl Extraction {
    pub fn into_records(self) -> Vec<ModuleLoadRecord> {
        match self {
            Extraction::Records(records) => records,
            Extraction::LoginNode => Vec::new(),
        }
    }
}

/// Parses log files against fixed ignore and category reference data.
pub struct LogRecordExtractor {
    ignore: IgnoreSet,
    categories: CategoryMap,
    strategies: Vec<Box<dyn AttributionStrategy>>,
    login_marker: String,
}

impl LogRecordExtractor {
    pub fn new(ignore: IgnoreSet, categories: CategoryMap) -> Self {
        Self {
            ignore,
            categories,
            strategies: attribution::default_strategies(),
            login_marker: DEFAULT_LOGIN_MARKER.to_string(),
        }
    }

    pub fn with_login_marker(mut self, marker: impl Into<String>) -> Self {
        self.login_marker = marker.into();
        self
    }

    /// Replace the attribution strategies; they are tried in the given order.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn AttributionStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Read and extract one log file.
    pub fn extract(&self, path: &Path) -> Result<Extraction> {
        let raw = std::fs::read_to_string(path).map_err(|e| SnoopError::file_read(path, e))?;
        self.extract_str(path, &raw)
    }

    /// Extract from already-loaded contents; `path` is only used to label errors.
    pub fn extract_str(&self, path: &Path, raw: &str) -> Result<Extraction> {
        let log: SnoopLog =
            serde_json::from_str(raw).map_err(|e| SnoopError::parse(path, e.to_string()))?;
        let env = EnvView::new(&log.env);

        let attribution = match attribution::attribute(&self.strategies, &env) {
            Some((scheduler, attribution)) => {
                trace!(path = %path.display(), scheduler, "Attributed run");
                attribution
            },
            None if log.hostname.contains(&self.login_marker) => {
                debug!(path = %path.display(), hostname = %log.hostname, "Skipping login node run");
                return Ok(Extraction::LoginNode);
            },
            None => Default::default(),
        };

        let na = || NOT_APPLICABLE.to_string();
        let job_id = attribution
            .job_id
            .or_else(|| env.get("PMI_JOBID"))
            .unwrap_or_else(na);
        let job_size = env.first_of(&JOB_SIZE_VARS).unwrap_or_else(|| "1".to_string());
        let user = resolve_user(&env).unwrap_or_else(na);
        let timestamp = log.timestamp.as_ref().map(value_text).unwrap_or_else(na);
        let python_executable = log.executable.as_ref().map(value_text).unwrap_or_else(na);

        let records = log
            .versions
            .iter()
            .map(|(module, version)| ModuleLoadRecord {
                module: module.clone(),
                version: value_text(version),
                user: user.clone(),
                hostname: log.hostname.clone(),
                timestamp: timestamp.clone(),
                python_executable: python_executable.clone(),
                ignored: self.is_ignored(module),
                job_id: job_id.clone(),
                queue: attribution.queue.clone().unwrap_or_else(na),
                job_size: job_size.clone(),
                account: attribution.account.clone().unwrap_or_else(na),
                node_number: attribution.node_number.clone().unwrap_or_else(na),
                job_name: attribution.job_name.clone().unwrap_or_else(na),
                job_directory: attribution.job_directory.clone().unwrap_or_else(na),
                pals_depth: env.get("PALS_DEPTH").unwrap_or_else(na),
                pals_rank_id: env.get("PALS_RANKID").unwrap_or_else(na),
                pals_local_rank_id: env.get("PALS_LOCAL_RANKID").unwrap_or_else(na),
                pals_node_id: env.get("PALS_NODEID").unwrap_or_else(na),
                pmi_local_rank: env.get("PMI_LOCAL_RANK").unwrap_or_else(na),
                pmi_local_size: env.get("PMI_LOCAL_SIZE").unwrap_or_else(na),
                pmi_rank: env.get("PMI_RANK").unwrap_or_else(na),
                pmi_size: env.get("PMI_SIZE").unwrap_or_else(na),
                category: self.categories.category_of(module).to_string(),
            })
            .collect();

        Ok(Extraction::Records(records))
    }

    /// Listed in the ignore set, private (`_name`) or a submodule (`pkg.sub`).
    pub fn is_ignored(&self, module: &str) -> bool {
        self.ignore.contains(module) || module.starts_with('_') || module.contains('.')
    }
}

/// `USER`, then `PBS_O_LOGNAME`, then the last component of `HOME`.
fn resolve_user(env: &EnvView<'_>) -> Option<String> {
    env.get("USER").or_else(|| env.get("PBS_O_LOGNAME")).or_else(|| {
        env.get("HOME").and_then(|home| {
            home.trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
    })
}
