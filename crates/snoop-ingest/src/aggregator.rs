//! Per-job aggregation of module-load records

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::catalog::NO_CATEGORY;
use crate::models::{JobRecord, ModuleLoadRecord};

/// Accumulates one job while its records stream past.
struct JobAccumulator {
    job: JobRecord,
    seen_categories: HashSet<String>,
    seen_modules: HashSet<String>,
}

impl JobAccumulator {
    fn new(first: &ModuleLoadRecord) -> Self {
        Self {
            job: JobRecord::from_first(first),
            seen_categories: HashSet::new(),
            seen_modules: HashSet::new(),
        }
    }

    fn add(&mut self, record: &ModuleLoadRecord) {
        if record.category != NO_CATEGORY && self.seen_categories.insert(record.category.clone()) {
            self.job.categories.push(record.category.clone());
        }

        if !record.ignored && self.seen_modules.insert(record.module.clone()) {
            self.job.non_ignored_modules.push(record.module.clone());
        }
    }

    fn finish(mut self) -> JobRecord {
        if self.job.categories.is_empty() {
            self.job.categories.push(NO_CATEGORY.to_string());
        }
        self.job
    }
}

/// Groups module-load records into one [`JobRecord`] per Job ID.
pub struct JobAggregator;

impl JobAggregator {
    /// Jobs come out sorted by Job ID. Records with an empty Job ID belong to no job.
    ///
    /// Job-level scalars are copied from the first record of each job without checking the
    /// other records agree.
    pub fn aggregate(records: &[ModuleLoadRecord]) -> Vec<JobRecord> {
        let mut groups: BTreeMap<&str, JobAccumulator> = BTreeMap::new();
        let mut unassigned = 0usize;

        for record in records {
            if record.job_id.is_empty() {
                unassigned += 1;
                continue;
            }
            groups
                .entry(record.job_id.as_str())
                .or_insert_with(|| JobAccumulator::new(record))
                .add(record);
        }

        debug!(
            records = records.len(),
            jobs = groups.len(),
            unassigned,
            "Aggregated module records by job"
        );

        groups.into_values().map(JobAccumulator::finish).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchedulerFields;
    use proptest::prelude::*;

    fn record(job_id: &str, module: &str, category: &str, ignored: bool) -> ModuleLoadRecord {
        ModuleLoadRecord {
            module: module.to_string(),
            version: "1.0".to_string(),
            user: format!("user-{job_id}"),
            hostname: format!("host-{module}"),
            timestamp: "2023-07-01T10:00:00".to_string(),
            python_executable: "python".to_string(),
            ignored,
            job_id: job_id.to_string(),
            queue: "prod".to_string(),
            job_size: "1".to_string(),
            account: "acct".to_string(),
            node_number: "N/A".to_string(),
            job_name: "N/A".to_string(),
            job_directory: "N/A".to_string(),
            pals_depth: "N/A".to_string(),
            pals_rank_id: "N/A".to_string(),
            pals_local_rank_id: "N/A".to_string(),
            pals_node_id: "N/A".to_string(),
            pmi_local_rank: "N/A".to_string(),
            pmi_local_size: "N/A".to_string(),
            pmi_rank: "N/A".to_string(),
            pmi_size: "N/A".to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_single_job() {
        let records = vec![
            record("123.pbs", "tensorflow", "AI", false),
            record("123.pbs", "os", "none", true),
        ];
        let jobs = JobAggregator::aggregate(&records);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "123.pbs");
        assert_eq!(jobs[0].categories, vec!["AI"]);
        assert_eq!(jobs[0].non_ignored_modules, vec!["tensorflow"]);
        assert_eq!(jobs[0].scheduler, SchedulerFields::default());
    }

    #[test]
    fn test_first_appearance_order_and_dedup() {
        let records = vec![
            record("7", "h5py", "IO", false),
            record("7", "numpy", "none", false),
            record("7", "torch", "AI", false),
            record("7", "h5py", "IO", false),
            record("7", "pandas", "IO", false),
        ];
        let job = &JobAggregator::aggregate(&records)[0];

        assert_eq!(job.categories, vec!["IO", "AI"]);
        assert_eq!(job.non_ignored_modules, vec!["h5py", "numpy", "torch", "pandas"]);
    }

    #[test]
    fn test_uncategorized_job_gets_none() {
        let records = vec![
            record("9", "requests", "none", false),
            record("9", "_ssl", "none", true),
        ];
        let job = &JobAggregator::aggregate(&records)[0];
        assert_eq!(job.categories, vec![NO_CATEGORY]);
        assert_eq!(job.non_ignored_modules, vec!["requests"]);
    }

    #[test]
    fn test_scalars_come_from_first_record() {
        let records = vec![record("1", "alpha", "none", false), record("1", "beta", "none", false)];
        let job = &JobAggregator::aggregate(&records)[0];
        assert_eq!(job.hostname, "host-alpha");
    }

    #[test]
    fn test_jobs_are_sorted_and_empty_ids_dropped() {
        let records = vec![
            record("b", "x", "none", false),
            record("", "x", "none", false),
            record("a", "x", "none", false),
        ];
        let ids: Vec<String> = JobAggregator::aggregate(&records)
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_no_records_no_jobs() {
        assert!(JobAggregator::aggregate(&[]).is_empty());
    }

    fn arb_record() -> impl Strategy<Value = ModuleLoadRecord> {
        (
            prop::sample::select(vec!["1.pbs", "2.pbs", "3.pbs"]),
            prop::sample::select(vec!["numpy", "torch", "os", "h5py", "_io"]),
            prop::sample::select(vec!["none", "AI", "IO"]),
        )
            .prop_map(|(job, module, category)| {
                record(job, module, category, matches!(module, "os" | "_io"))
            })
    }

    proptest! {
        #[test]
        fn prop_categories_hold_none_only_alone(
            records in prop::collection::vec(arb_record(), 0..40)
        ) {
            for job in JobAggregator::aggregate(&records) {
                prop_assert!(!job.categories.is_empty());
                if job.categories.iter().any(|c| c == NO_CATEGORY) {
                    prop_assert_eq!(job.categories.len(), 1);
                }
            }
        }

        #[test]
        fn prop_non_ignored_modules_were_never_ignored(
            records in prop::collection::vec(arb_record(), 0..40)
        ) {
            let jobs = JobAggregator::aggregate(&records);
            for job in &jobs {
                for module in &job.non_ignored_modules {
                    prop_assert!(records
                        .iter()
                        .filter(|r| r.job_id == job.job_id && r.module == *module)
                        .all(|r| !r.ignored));
                }
            }
            let ids: HashSet<&str> = records.iter().map(|r| r.job_id.as_str()).collect();
            prop_assert_eq!(jobs.len(), ids.len());
        }
    }
}
