//! Day-by-day pipeline driver
//!
//! Log files live under `<root>/<YYYY>/<MM>/<DD>/`. The module stage writes one
//! `modules_<YYYY>_<MM>_<DD>.csv.gz` table per day; the job stage turns a module table into
//! `<name><postfix>.csv.gz` next to it.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::aggregator::JobAggregator;
use crate::ingestor::ParallelIngestor;
use crate::models::{JobRecord, ModuleLoadRecord};
use crate::output;
use crate::scheduler::{EnrichmentSummary, JobAccountingClient, SchedulerEnricher};

const TABLE_SUFFIX: &str = ".csv.gz";

/// One `<YYYY>/<MM>/<DD>` directory of log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDirectory {
    pub year: String,
    pub month: String,
    pub day: String,
    pub path: PathBuf,
}

impl DayDirectory {
    /// Read year, month and day from the last three components of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let day = file_name(path)?;
        let month_dir = path.parent()?;
        let month = file_name(month_dir)?;
        let year = file_name(month_dir.parent()?)?;
        Some(Self {
            year,
            month,
            day,
            path: path.to_path_buf(),
        })
    }

    /// `modules_<YYYY>_<MM>_<DD>.csv.gz`
    pub fn module_table_name(&self) -> String {
        format!("modules_{}_{}_{}{TABLE_SUFFIX}", self.year, self.month, self.day)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(OsStr::to_str).map(str::to_string)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Two-character day directories of a month directory, in name order.
pub fn day_directories(month_dir: &Path) -> Result<Vec<DayDirectory>> {
    let mut days = Vec::new();
    for entry in WalkDir::new(month_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", month_dir.display()))?;
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_dir() || name.chars().count() != 2 {
            continue;
        }
        let day = DayDirectory::from_path(entry.path()).with_context(|| {
            format!("{} is not under a <YYYY>/<MM> directory", entry.path().display())
        })?;
        days.push(day);
    }
    Ok(days)
}

/// Log files directly inside `day_dir`, in name order. Hidden files are left out.
pub fn log_files(day_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(day_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", day_dir.display()))?;
        if entry.file_type().is_file() && !is_hidden(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Job table written for `module_table`: `.csv.gz` replaced by `<postfix>.csv.gz`.
pub fn job_table_path(module_table: &Path, postfix: &str) -> PathBuf {
    let name = module_table.file_name().unwrap_or_default().to_string_lossy();
    let stem = name.strip_suffix(TABLE_SUFFIX).unwrap_or(&name);
    module_table.with_file_name(format!("{stem}{postfix}{TABLE_SUFFIX}"))
}

/// Module tables to aggregate. Directories are expanded to the `.csv.gz` files they hold,
/// leaving out job tables already carrying `postfix`.
pub fn module_tables(inputs: &[PathBuf], postfix: &str) -> Result<Vec<PathBuf>> {
    let job_suffix = format!("{postfix}{TABLE_SUFFIX}");
    let mut tables = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            tables.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to list {}", input.display()))?;
            let is_module_table = {
                let name = entry.file_name().to_string_lossy();
                name.ends_with(TABLE_SUFFIX) && !name.ends_with(&job_suffix)
            };
            if entry.file_type().is_file() && is_module_table {
                tables.push(entry.into_path());
            }
        }
    }
    Ok(tables)
}

/// Outcome of the module stage over one month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleStageSummary {
    pub days_written: usize,
    /// Output already present and `overwrite` not set
    pub days_existing: usize,
    /// No log files
    pub days_empty: usize,
    pub files_extracted: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub records: usize,
}

/// Write one module table per day directory of `month_dir` into `output_dir`.
pub async fn build_module_tables(
    ingestor: &ParallelIngestor,
    month_dir: &Path,
    output_dir: &Path,
    overwrite: bool,
) -> Result<ModuleStageSummary> {
    let start = Instant::now();
    let mut summary = ModuleStageSummary::default();

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    for day in day_directories(month_dir)? {
        let files = log_files(&day.path)?;
        if files.is_empty() {
            info!(day = %day.path.display(), "No log files found, skipping day");
            summary.days_empty += 1;
            continue;
        }

        let table = output_dir.join(day.module_table_name());
        if table.exists() && !overwrite {
            info!(path = %table.display(), "Module table exists, skipping day");
            summary.days_existing += 1;
            continue;
        }

        info!(day = %day.path.display(), files = files.len(), "Processing day");
        let report = ingestor.ingest(files).await;
        output::save_module_table(&table, &report.records)
            .with_context(|| format!("Failed to write {}", table.display()))?;

        summary.days_written += 1;
        summary.files_extracted += report.files_extracted;
        summary.files_skipped += report.files_skipped;
        summary.files_failed += report.failures.len();
        summary.records += report.records.len();
    }

    info!(
        written = summary.days_written,
        existing = summary.days_existing,
        empty = summary.days_empty,
        failed_files = summary.files_failed,
        "Module stage complete in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Outcome of writing one job table.
#[derive(Debug, Clone)]
pub struct JobStageSummary {
    pub output: PathBuf,
    pub jobs: usize,
    /// `None` when enrichment was not requested
    pub enrichment: Option<EnrichmentSummary>,
}

/// Aggregate `records`, enrich the jobs if an enricher is given, and write the job table.
pub async fn write_jobs<C: JobAccountingClient>(
    records: &[ModuleLoadRecord],
    output: &Path,
    enricher: Option<&SchedulerEnricher<C>>,
) -> Result<(Vec<JobRecord>, JobStageSummary)> {
    let mut jobs = JobAggregator::aggregate(records);

    let enrichment = match enricher {
        Some(enricher) => Some(enricher.enrich_all(&mut jobs).await),
        None => None,
    };

    output::save_job_table(output, &jobs)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(path = %output.display(), jobs = jobs.len(), "Wrote job table");

    let summary = JobStageSummary {
        output: output.to_path_buf(),
        jobs: jobs.len(),
        enrichment,
    };
    Ok((jobs, summary))
}

/// Turn one module table into its job table.
pub async fn build_job_table<C: JobAccountingClient>(
    module_table: &Path,
    postfix: &str,
    enricher: Option<&SchedulerEnricher<C>>,
) -> Result<JobStageSummary> {
    let records = output::load_module_table(module_table)
        .with_context(|| format!("Failed to read {}", module_table.display()))?;
    if records.is_empty() {
        warn!(path = %module_table.display(), "Module table has no records");
    }

    let output = job_table_path(module_table, postfix);
    let (_, summary) = write_jobs(&records, &output, enricher).await?;
    Ok(summary)
}

/// Outcome of the job stage over several module tables.
#[derive(Debug, Default)]
pub struct JobTablesSummary {
    pub written: Vec<JobStageSummary>,
    /// Module tables whose job table could not be built, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Build the job table of every module table in turn. A table that fails is logged and counted;
/// the rest are still processed.
pub async fn build_job_tables<C: JobAccountingClient>(
    tables: &[PathBuf],
    postfix: &str,
    enricher: Option<&SchedulerEnricher<C>>,
) -> JobTablesSummary {
    let mut summary = JobTablesSummary::default();

    for table in tables {
        info!(path = %table.display(), "Aggregating module table");
        match build_job_table(table, postfix, enricher).await {
            Ok(written) => summary.written.push(written),
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(path = %table.display(), error = %reason, "Job table failed");
                summary.failed.push((table.clone(), reason));
            },
        }
    }

    info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        "Job stage complete"
    );
    summary
}

/// Both stages for one day directory, in memory; only the job table is written.
pub async fn run_day<C: JobAccountingClient>(
    ingestor: &ParallelIngestor,
    day_dir: &Path,
    output: &Path,
    enricher: Option<&SchedulerEnricher<C>>,
) -> Result<JobStageSummary> {
    let files = log_files(day_dir)?;
    if files.is_empty() {
        warn!(day = %day_dir.display(), "No log files found");
    }

    let report = ingestor.ingest(files).await;
    let (_, summary) = write_jobs(&report.records, output, enricher).await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_day_directory_from_path() {
        let day = DayDirectory::from_path(Path::new("/logs/2023/07/01")).unwrap();
        assert_eq!(day.year, "2023");
        assert_eq!(day.month, "07");
        assert_eq!(day.day, "01");
        assert_eq!(day.module_table_name(), "modules_2023_07_01.csv.gz");
        assert!(DayDirectory::from_path(Path::new("01")).is_none());
    }

    #[test]
    fn test_job_table_path() {
        assert_eq!(
            job_table_path(Path::new("/out/modules_2023_07_01.csv.gz"), "_byjob"),
            PathBuf::from("/out/modules_2023_07_01_byjob.csv.gz")
        );
        assert_eq!(
            job_table_path(Path::new("table"), "_byjob"),
            PathBuf::from("table_byjob.csv.gz")
        );
    }

    #[test]
    fn test_day_directories_and_log_files_are_sorted() {
        let root = tempfile::tempdir().unwrap();
        let month = root.path().join("2023").join("07");
        for day in ["02", "01", "notes"] {
            fs::create_dir_all(month.join(day)).unwrap();
        }
        fs::write(month.join("README"), "").unwrap();
        for name in ["b.json", "a.json", ".hidden"] {
            fs::write(month.join("01").join(name), "{}").unwrap();
        }

        let days: Vec<String> = day_directories(&month)
            .unwrap()
            .into_iter()
            .map(|d| d.day)
            .collect();
        assert_eq!(days, vec!["01", "02"]);

        let names: Vec<String> = log_files(&month.join("01"))
            .unwrap()
            .iter()
            .map(|p| file_name(p).unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(log_files(&month.join("02")).unwrap().is_empty());
    }

    #[test]
    fn test_module_tables_skip_job_tables() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "modules_2023_07_02.csv.gz",
            "modules_2023_07_01.csv.gz",
            "modules_2023_07_01_byjob.csv.gz",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let explicit = PathBuf::from("/elsewhere/modules_2023_06_30.csv.gz");

        let tables =
            module_tables(&[dir.path().to_path_buf(), explicit.clone()], "_byjob").unwrap();
        assert_eq!(
            tables,
            vec![
                dir.path().join("modules_2023_07_01.csv.gz"),
                dir.path().join("modules_2023_07_02.csv.gz"),
                explicit,
            ]
        );
    }
}
