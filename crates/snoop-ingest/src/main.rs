//! Module Snooper Ingest - log to job table pipeline

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use snoop_common::logging::{init_logging, LogConfig, LogLevel};
use snoop_ingest::pipeline::{self, DayDirectory, JobStageSummary};
use snoop_ingest::{
    CategoryMap, IgnoreSet, LogRecordExtractor, ParallelIngestor, PipelineConfig, QstatClient,
    SchedulerEnricher,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "snoop-ingest")]
#[command(author, version, about = "Module snooper log ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one module table per day of a month directory
    Modules {
        /// Month directory laid out as <YYYY>/<MM>/<DD>/
        #[arg(short, long)]
        logs: PathBuf,

        /// Output directory for the module tables
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Worker pool size [env: SNOOP_WORKERS]
        #[arg(short = 'n', long)]
        workers: Option<usize>,

        /// Overwrite existing module tables
        #[arg(long)]
        overwrite: bool,
    },

    /// Aggregate module tables into job tables
    Jobs {
        /// Module tables, or directories holding them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Postfix for the job table names [env: SNOOP_OUTPUT_POSTFIX]
        #[arg(short, long)]
        postfix: Option<String>,

        #[command(flatten)]
        scheduler: SchedulerArgs,
    },

    /// Run both stages for one day directory, writing only the job table
    Run {
        /// Day directory of log files
        #[arg(short, long)]
        day: PathBuf,

        /// Job table to write (default: modules_<YYYY>_<MM>_<DD><postfix>.csv.gz)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Worker pool size [env: SNOOP_WORKERS]
        #[arg(short = 'n', long)]
        workers: Option<usize>,

        #[command(flatten)]
        scheduler: SchedulerArgs,
    },
}

#[derive(Args, Debug)]
struct ReferenceArgs {
    /// JSON array of module names to ignore
    #[arg(short, long, env = "SNOOP_IGNORE_FILE")]
    ignore: PathBuf,

    /// JSON object mapping category names to module names
    #[arg(short, long, env = "SNOOP_CATEGORY_FILE")]
    categories: PathBuf,
}

#[derive(Args, Debug)]
struct SchedulerArgs {
    /// Skip scheduler enrichment
    #[arg(long)]
    no_enrich: bool,

    /// Scheduler accounting command [env: SNOOP_QSTAT_BIN]
    #[arg(long)]
    qstat: Option<String>,

    /// Per-query timeout in seconds, 0 for none [env: SNOOP_SCHEDULER_TIMEOUT_SECS]
    #[arg(long)]
    scheduler_timeout: Option<u64>,
}

impl SchedulerArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(qstat) = &self.qstat {
            config.qstat_bin = qstat.clone();
        }
        if let Some(secs) = self.scheduler_timeout {
            config.scheduler_timeout_secs = secs;
        }
    }

    fn enricher(&self, config: &PipelineConfig) -> Result<Option<SchedulerEnricher<QstatClient>>> {
        if self.no_enrich {
            info!("Scheduler enrichment disabled");
            return Ok(None);
        }
        let client =
            QstatClient::new(config.qstat_bin.clone()).with_timeout(config.scheduler_timeout());
        Ok(Some(SchedulerEnricher::new(client).with_states(config.job_states()?)))
    }
}

impl ReferenceArgs {
    fn extractor(&self, config: &PipelineConfig) -> Result<LogRecordExtractor> {
        let ignore = IgnoreSet::from_file(&self.ignore)
            .with_context(|| format!("Failed to load ignore list {}", self.ignore.display()))?;
        let categories = CategoryMap::from_file(&self.categories).with_context(|| {
            format!("Failed to load category map {}", self.categories.display())
        })?;
        info!(
            ignored = ignore.len(),
            categories = categories.len(),
            "Loaded reference data"
        );
        Ok(LogRecordExtractor::new(ignore, categories)
            .with_login_marker(config.login_marker.clone()))
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn build_ingestor(
    extractor: LogRecordExtractor,
    config: &PipelineConfig,
    message: &str,
) -> Result<ParallelIngestor> {
    let pb = progress_bar()?;
    pb.set_message(message.to_string());
    Ok(ParallelIngestor::new(extractor, config.workers).with_progress(pb))
}

fn report(summary: &JobStageSummary) {
    match &summary.enrichment {
        Some(e) if e.failed > 0 || e.unknown_state > 0 => warn!(
            path = %summary.output.display(),
            jobs = summary.jobs,
            failed = e.failed,
            unknown_state = e.unknown_state,
            "Job table written with incomplete enrichment"
        ),
        _ => info!(path = %summary.output.display(), jobs = summary.jobs, "Job table written"),
    }
}

fn default_run_output(day: &Path, postfix: &str) -> Result<PathBuf> {
    let day_dir = DayDirectory::from_path(day).with_context(|| {
        format!("Cannot name output for {}; pass --output", day.display())
    })?;
    let table = PathBuf::from(day_dir.module_table_name());
    Ok(pipeline::job_table_path(&table, postfix))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("snoop-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = PipelineConfig::from_env()?;

    match cli.command {
        Command::Modules {
            logs,
            output,
            reference,
            workers,
            overwrite,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate()?;

            let extractor = reference.extractor(&config)?;
            let ingestor = build_ingestor(extractor, &config, "Extracting log files")?;
            let summary =
                pipeline::build_module_tables(&ingestor, &logs, &output, overwrite).await?;
            info!(
                written = summary.days_written,
                records = summary.records,
                failed_files = summary.files_failed,
                "Module tables complete"
            );
        },
        Command::Jobs {
            inputs,
            postfix,
            scheduler,
        } => {
            if let Some(postfix) = postfix {
                config.output_postfix = postfix;
            }
            scheduler.apply(&mut config);
            config.validate()?;

            let enricher = scheduler.enricher(&config)?;
            let tables = pipeline::module_tables(&inputs, &config.output_postfix)?;
            if tables.is_empty() {
                warn!("No module tables found");
            }

            let summary =
                pipeline::build_job_tables(&tables, &config.output_postfix, enricher.as_ref())
                    .await;
            summary.written.iter().for_each(report);
            if !summary.failed.is_empty() {
                anyhow::bail!("{} of {} module tables failed", summary.failed.len(), tables.len());
            }
        },
        Command::Run {
            day,
            output,
            reference,
            workers,
            scheduler,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            scheduler.apply(&mut config);
            config.validate()?;

            let output = match output {
                Some(path) => path,
                None => default_run_output(&day, &config.output_postfix)?,
            };

            let extractor = reference.extractor(&config)?;
            let ingestor = build_ingestor(extractor, &config, "Extracting log files")?;
            let enricher = scheduler.enricher(&config)?;
            let summary = pipeline::run_day(&ingestor, &day, &output, enricher.as_ref()).await?;
            report(&summary);
        },
    }

    info!("Ingestion complete");
    Ok(())
}
