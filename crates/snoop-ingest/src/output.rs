//! Module and job tables on disk
//!
//! Both tables are gzip-compressed CSV with a header row. In the job table the list columns
//! (Categories, Non-Ignored Modules) hold JSON arrays and missing enrichment fields are empty
//! cells. The gzip header carries no timestamp or file name, so the same rows always produce the
//! same bytes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use snoop_common::{Result, SnoopError};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{JobRecord, ModuleLoadRecord, SchedulerFields};

/// Header of the module table, in column order.
pub const MODULE_COLUMNS: [&str; 23] = [
    "Module",
    "Version",
    "User",
    "Hostname",
    "Timestamp",
    "Python Executable",
    "Ignored",
    "Job ID",
    "Queue",
    "Job Size",
    "Account",
    "Node Number",
    "Job Name",
    "Job Directory",
    "PALS Depth",
    "PALS Rank ID",
    "PALS Local Rank ID",
    "PALS Node ID",
    "PMI Local Rank",
    "PMI Local Size",
    "PMI Rank",
    "PMI Size",
    "Category",
];

/// Header of the job table, in column order.
pub const JOB_COLUMNS: [&str; 22] = [
    "Job ID",
    "Categories",
    "Non-Ignored Modules",
    "User",
    "Hostname",
    "Queue",
    "Job Size",
    "Account",
    "Node Number",
    "Job Name",
    "Job Directory",
    "Timestamp",
    "PALS Depth",
    "PMI Size",
    "PMI Local Size",
    "Filesystems",
    "Award Category",
    "Walltime",
    "Nodes",
    "Runtime",
    "Exit Status",
    "Job State",
];

/// One job table row.
#[derive(Debug, Serialize, Deserialize)]
struct JobRow {
    #[serde(rename = "Job ID")]
    job_id: String,
    #[serde(rename = "Categories")]
    categories: String,
    #[serde(rename = "Non-Ignored Modules")]
    non_ignored_modules: String,
    #[serde(rename = "User")]
    user: String,
    #[serde(rename = "Hostname")]
    hostname: String,
    #[serde(rename = "Queue")]
    queue: String,
    #[serde(rename = "Job Size")]
    job_size: String,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Node Number")]
    node_number: String,
    #[serde(rename = "Job Name")]
    job_name: String,
    #[serde(rename = "Job Directory")]
    job_directory: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "PALS Depth")]
    pals_depth: String,
    #[serde(rename = "PMI Size")]
    pmi_size: String,
    #[serde(rename = "PMI Local Size")]
    pmi_local_size: String,
    #[serde(rename = "Filesystems")]
    filesystems: Option<String>,
    #[serde(rename = "Award Category")]
    award_category: Option<String>,
    #[serde(rename = "Walltime")]
    walltime_secs: Option<u64>,
    #[serde(rename = "Nodes")]
    nodes: Option<u64>,
    #[serde(rename = "Runtime")]
    runtime_secs: Option<u64>,
    #[serde(rename = "Exit Status")]
    exit_status: Option<String>,
    #[serde(rename = "Job State")]
    job_state: Option<String>,
}

impl JobRow {
    fn from_job(job: &JobRecord) -> Result<Self> {
        let s = &job.scheduler;
        Ok(Self {
            job_id: job.job_id.clone(),
            categories: serde_json::to_string(&job.categories)?,
            non_ignored_modules: serde_json::to_string(&job.non_ignored_modules)?,
            user: job.user.clone(),
            hostname: job.hostname.clone(),
            queue: job.queue.clone(),
            job_size: job.job_size.clone(),
            account: job.account.clone(),
            node_number: job.node_number.clone(),
            job_name: job.job_name.clone(),
            job_directory: job.job_directory.clone(),
            timestamp: job.timestamp.clone(),
            pals_depth: job.pals_depth.clone(),
            pmi_size: job.pmi_size.clone(),
            pmi_local_size: job.pmi_local_size.clone(),
            filesystems: s.filesystems.clone(),
            award_category: s.award_category.clone(),
            walltime_secs: s.walltime_secs,
            nodes: s.nodes,
            runtime_secs: s.runtime_secs,
            exit_status: s.exit_status.clone(),
            job_state: s.job_state.clone(),
        })
    }

    fn into_job(self) -> Result<JobRecord> {
        Ok(JobRecord {
            categories: serde_json::from_str(&self.categories)?,
            non_ignored_modules: serde_json::from_str(&self.non_ignored_modules)?,
            job_id: self.job_id,
            user: self.user,
            hostname: self.hostname,
            queue: self.queue,
            job_size: self.job_size,
            account: self.account,
            node_number: self.node_number,
            job_name: self.job_name,
            job_directory: self.job_directory,
            timestamp: self.timestamp,
            pals_depth: self.pals_depth,
            pmi_size: self.pmi_size,
            pmi_local_size: self.pmi_local_size,
            scheduler: SchedulerFields {
                filesystems: self.filesystems,
                award_category: self.award_category,
                walltime_secs: self.walltime_secs,
                nodes: self.nodes,
                runtime_secs: self.runtime_secs,
                exit_status: self.exit_status,
                job_state: self.job_state,
            },
        })
    }
}

fn csv_error(e: csv::Error) -> SnoopError {
    SnoopError::output(e.to_string())
}

/// Serialize `rows` as CSV, writing the header even when there are no rows.
fn write_rows<W, T, I>(writer: W, header: &[&str], rows: I) -> Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(header).map_err(csv_error)?;
    for row in rows {
        wtr.serialize(row).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_module_table<W: Write>(writer: W, records: &[ModuleLoadRecord]) -> Result<()> {
    write_rows(writer, &MODULE_COLUMNS, records)
}

/// A reader whose header has been read. `deserialize` alone drops header errors, so a stream
/// that fails before its first line would look empty.
fn table_reader<R: Read>(reader: R) -> Result<csv::Reader<R>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.headers().map_err(csv_error)?;
    Ok(rdr)
}

pub fn read_module_table<R: Read>(reader: R) -> Result<Vec<ModuleLoadRecord>> {
    table_reader(reader)?
        .deserialize()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_error)
}

pub fn write_job_table<W: Write>(writer: W, jobs: &[JobRecord]) -> Result<()> {
    let rows = jobs.iter().map(JobRow::from_job).collect::<Result<Vec<_>>>()?;
    write_rows(writer, &JOB_COLUMNS, rows)
}

pub fn read_job_table<R: Read>(reader: R) -> Result<Vec<JobRecord>> {
    table_reader(reader)?
        .deserialize::<JobRow>()
        .map(|row| row.map_err(csv_error)?.into_job())
        .collect()
}

/// Gzip `body`'s output and move it into place at `path` once complete.
fn save_gz<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut GzEncoder<Vec<u8>>) -> Result<()>,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    body(&mut encoder)?;
    let bytes = encoder.finish()?;

    let partial = partial_path(path);
    fs::write(&partial, &bytes)
        .map_err(|e| SnoopError::output(format!("failed to write {}: {e}", partial.display())))?;
    fs::rename(&partial, path)
        .map_err(|e| SnoopError::output(format!("failed to move {}: {e}", path.display())))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote table");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

fn open_gz(path: &Path) -> Result<GzDecoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| SnoopError::file_read(path, e))?;
    Ok(GzDecoder::new(BufReader::new(file)))
}

/// Write a gzip module table to `path`.
pub fn save_module_table(path: &Path, records: &[ModuleLoadRecord]) -> Result<()> {
    save_gz(path, |out| write_module_table(out, records))
}

pub fn load_module_table(path: &Path) -> Result<Vec<ModuleLoadRecord>> {
    read_module_table(open_gz(path)?).map_err(|e| SnoopError::parse(path, e.to_string()))
}

/// Write a gzip job table to `path`.
pub fn save_job_table(path: &Path, jobs: &[JobRecord]) -> Result<()> {
    save_gz(path, |out| write_job_table(out, jobs))
}

pub fn load_job_table(path: &Path) -> Result<Vec<JobRecord>> {
    read_job_table(open_gz(path)?).map_err(|e| SnoopError::parse(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snoop_common::NOT_APPLICABLE;

    fn module(name: &str, ignored: bool, category: &str) -> ModuleLoadRecord {
        ModuleLoadRecord {
            module: name.to_string(),
            version: "2.1".to_string(),
            user: "alice".to_string(),
            hostname: "x3005c0s7b0n0".to_string(),
            timestamp: "2023-07-01T10:00:00".to_string(),
            python_executable: "/usr/bin/python3".to_string(),
            ignored,
            job_id: "123.pbs".to_string(),
            queue: "q1".to_string(),
            job_size: "1".to_string(),
            account: "acctX".to_string(),
            node_number: NOT_APPLICABLE.to_string(),
            job_name: NOT_APPLICABLE.to_string(),
            job_directory: "/home/alice, run 1".to_string(),
            pals_depth: NOT_APPLICABLE.to_string(),
            pals_rank_id: NOT_APPLICABLE.to_string(),
            pals_local_rank_id: NOT_APPLICABLE.to_string(),
            pals_node_id: NOT_APPLICABLE.to_string(),
            pmi_local_rank: NOT_APPLICABLE.to_string(),
            pmi_local_size: NOT_APPLICABLE.to_string(),
            pmi_rank: NOT_APPLICABLE.to_string(),
            pmi_size: NOT_APPLICABLE.to_string(),
            category: category.to_string(),
        }
    }

    fn job() -> JobRecord {
        let mut job = JobRecord::from_first(&module("tensorflow", false, "AI"));
        job.categories = vec!["AI".to_string(), "IO".to_string()];
        job.non_ignored_modules = vec!["tensorflow".to_string(), "h5py".to_string()];
        job.scheduler = SchedulerFields {
            filesystems: Some("home:eagle".to_string()),
            walltime_secs: Some(5460),
            nodes: Some(4),
            runtime_secs: Some(2520),
            exit_status: Some("0".to_string()),
            job_state: Some("Finished".to_string()),
            ..SchedulerFields::default()
        };
        job
    }

    #[test]
    fn test_module_table_header_matches_record_fields() {
        let mut buf = Vec::new();
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.serialize(module("os", true, "none")).unwrap();
        wtr.flush().unwrap();
        drop(wtr);

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().next().unwrap(), MODULE_COLUMNS.join(","));
    }

    #[test]
    fn test_module_table_reads_back() {
        let records = vec![module("tensorflow", false, "AI"), module("os", true, "none")];
        let mut buf = Vec::new();
        write_module_table(&mut buf, &records).unwrap();

        assert_eq!(read_module_table(buf.as_slice()).unwrap(), records);
    }

    #[test]
    fn test_job_table_encoding() {
        let mut unenriched = job();
        unenriched.job_id = "999.pbs".to_string();
        unenriched.scheduler = SchedulerFields::default();

        let mut buf = Vec::new();
        write_job_table(&mut buf, &[job(), unenriched]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], JOB_COLUMNS.join(","));
        let expected = r#"123.pbs,"[""AI"",""IO""]","[""tensorflow"",""h5py""]",alice"#;
        assert!(lines[1].starts_with(expected));
        assert!(lines[1].ends_with(",home:eagle,,5460,4,2520,0,Finished"));
        assert!(lines[2].ends_with(",,,,,,,"));
    }

    #[test]
    fn test_job_table_reads_back() {
        let jobs = vec![job()];
        let mut buf = Vec::new();
        write_job_table(&mut buf, &jobs).unwrap();
        assert_eq!(read_job_table(buf.as_slice()).unwrap(), jobs);
    }

    #[test]
    fn test_empty_tables_keep_their_header() {
        let mut buf = Vec::new();
        write_job_table(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim_end(), JOB_COLUMNS.join(","));
        assert!(read_job_table(JOB_COLUMNS.join(",").as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_gz_output_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a_byjob.csv.gz");
        let second = dir.path().join("b_byjob.csv.gz");

        save_job_table(&first, &[job()]).unwrap();
        save_job_table(&second, &[job()]).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        assert!(!partial_path(&first).exists());
        assert_eq!(load_job_table(&first).unwrap(), vec![job()]);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("modules_2023_07_01.csv.gz");
        assert!(matches!(
            load_module_table(&missing).unwrap_err(),
            SnoopError::FileRead { .. }
        ));

        let plain = dir.path().join("plain.csv.gz");
        fs::write(&plain, "not gzip").unwrap();
        let err = load_module_table(&plain).unwrap_err();
        assert_eq!(err.unit().unwrap(), plain.display().to_string());
        assert!(load_job_table(&plain).is_err());
    }

    #[test]
    fn test_truncated_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("modules_2023_07_01.csv.gz");
        let records: Vec<_> = (0..200)
            .map(|i| module(&format!("module{i}"), false, "none"))
            .collect();
        save_module_table(&table, &records).unwrap();

        let bytes = fs::read(&table).unwrap();
        fs::write(&table, &bytes[..bytes.len() / 2]).unwrap();

        let err = load_module_table(&table).unwrap_err();
        assert!(matches!(err, SnoopError::Parse { .. }));
        assert_eq!(err.unit().unwrap(), table.display().to_string());
    }
}
