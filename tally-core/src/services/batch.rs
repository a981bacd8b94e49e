//! Batch orchestration - bounded worker pool and per-month folder merges
//!
//! The core merge stays single-threaded; parallelism only happens here, one
//! job per folder. A job that returns an error or panics becomes a failed
//! outcome for that job alone.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;

use crate::adapters::filesystem::FolderSource;
use crate::domain::{Period, SourceFailure};
use crate::ports::{ReportSink, SourceProvider};
use crate::services::batch_merge::BatchMerge;
use crate::services::ingest::IngestService;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 4;

/// Default output name for a merged month
pub const DEFAULT_OUTPUT_PATTERN: &str = "merged-{period}";

/// Progress notifications sent while a batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Finished,
    Failed,
}

/// Result of one job; errors and panics are flattened to a message
#[derive(Debug)]
pub struct JobOutcome<T> {
    pub name: String,
    pub result: std::result::Result<T, String>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Runs named jobs on a bounded rayon pool
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    workers: usize,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl BatchRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job on a pool of `workers` threads and return the outcomes in job order
    pub fn run<J, T, F, P>(&self, jobs: Vec<(String, J)>, work: F, progress: P) -> Result<Vec<JobOutcome<T>>>
    where
        J: Send,
        T: Send,
        F: Fn(&str, J) -> Result<T> + Sync,
        P: Fn(&str, JobStatus) + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("tally-batch-{}", i))
            .build()
            .context("Failed to start worker pool")?;

        let outcomes = pool.install(|| {
            jobs.into_par_iter()
                .map(|(name, job)| {
                    progress(&name, JobStatus::Started);
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&name, job))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(format!("{:#}", e)),
                        Err(payload) => Err(panic_message(payload)),
                    };
                    let status = if result.is_ok() {
                        JobStatus::Finished
                    } else {
                        JobStatus::Failed
                    };
                    progress(&name, status);
                    JobOutcome { name, result }
                })
                .collect()
        });
        Ok(outcomes)
    }
}

/// What happened to one month folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderStatus {
    Saved,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderReport {
    pub folder: String,
    pub period: Period,
    pub status: FolderStatus,
    pub outputs: Vec<PathBuf>,
    pub sources: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub rejected: Vec<SourceFailure>,
    pub error: Option<String>,
}

impl FolderReport {
    fn new(folder: String, period: Period, status: FolderStatus) -> Self {
        Self {
            folder,
            period,
            status,
            outputs: Vec::new(),
            sources: 0,
            merged: 0,
            duplicates: 0,
            rejected: Vec::new(),
            error: None,
        }
    }

    fn failed(folder: String, period: Period, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(folder, period, FolderStatus::Failed)
        }
    }
}

/// Subfolders of `root` named exactly `YYYY.MM`, oldest first
pub fn discover_month_folders(root: &Path) -> Result<Vec<(PathBuf, Period)>> {
    let mut folders = Vec::new();
    let entries = std::fs::read_dir(root).with_context(|| format!("Cannot read {}", root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let period = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<Period>().ok());
        if let Some(period) = period {
            folders.push((path, period));
        }
    }
    folders.sort_by_key(|(_, period)| *period);
    Ok(folders)
}

/// One single-batch merge per month folder, written through a sink
pub struct SubfolderMerge<'a> {
    ingest: &'a IngestService,
    sink: &'a dyn ReportSink,
    output_pattern: String,
    overwrite: bool,
    encodings: Vec<String>,
}

impl<'a> SubfolderMerge<'a> {
    pub fn new(ingest: &'a IngestService, sink: &'a dyn ReportSink) -> Self {
        Self {
            ingest,
            sink,
            output_pattern: DEFAULT_OUTPUT_PATTERN.to_string(),
            overwrite: false,
            encodings: ingest.text_parser().encodings().to_vec(),
        }
    }

    /// Output name pattern; `{period}` is replaced with `YYYY.MM`
    pub fn with_output_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.output_pattern = pattern.into();
        self
    }

    /// Rewrite outputs that already exist instead of skipping the folder
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn output_name(&self, period: Period) -> String {
        self.output_pattern.replace("{period}", &period.to_string())
    }

    /// Merge every month folder under `root` on the runner's pool
    pub fn run<P>(&self, root: &Path, runner: &BatchRunner, progress: P) -> Result<Vec<FolderReport>>
    where
        P: Fn(&str, JobStatus) + Sync,
    {
        let folders = discover_month_folders(root)?;
        let jobs: Vec<(String, (PathBuf, Period))> = folders
            .into_iter()
            .map(|(path, period)| (period.to_string(), (path, period)))
            .collect();
        let periods: Vec<Period> = jobs.iter().map(|(_, (_, p))| *p).collect();

        let outcomes = runner.run(jobs, |name, (path, period)| self.merge_folder(name, &path, period), progress)?;

        Ok(outcomes
            .into_iter()
            .zip(periods)
            .map(|(outcome, period)| match outcome.result {
                Ok(report) => report,
                Err(message) => FolderReport::failed(outcome.name, period, message),
            })
            .collect())
    }

    /// Merge a single month folder
    pub fn merge_folder(&self, folder: &str, path: &Path, period: Period) -> Result<FolderReport> {
        let output = self.output_name(period);
        if !self.overwrite && self.sink.target(&output).exists() {
            return Ok(FolderReport::new(folder.to_string(), period, FolderStatus::Skipped));
        }

        let load = FolderSource::new(path)
            .with_encodings(self.encodings.clone())
            .load()?;
        let ingested = self.ingest.ingest_load(load);
        if ingested.accepted.is_empty() {
            let mut report = FolderReport::failed(folder.to_string(), period, "no usable sources");
            report.rejected = ingested.rejected;
            return Ok(report);
        }

        let snapshots: Vec<_> = ingested.snapshots().cloned().collect();
        let outcome = BatchMerge::run(&snapshots);
        let outputs = self
            .sink
            .write_batch(&output, &outcome)
            .with_context(|| format!("Failed to write {}", output))?;

        Ok(FolderReport {
            outputs,
            sources: ingested.accepted.len(),
            merged: outcome.merged.len(),
            duplicates: outcome.duplicates.len(),
            rejected: ingested.rejected,
            ..FolderReport::new(folder.to_string(), period, FolderStatus::Saved)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CsvSink;
    use std::fs;
    use std::thread;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn test_runner_keeps_job_order() {
        let jobs: Vec<(String, u64)> = (0..10).map(|i| (format!("job{}", i), i)).collect();
        let outcomes = BatchRunner::new(3).run(
            jobs,
            |_, n| {
                thread::sleep(std::time::Duration::from_millis(10 - n));
                Ok(n * 2)
            },
            |_, _| {},
        )
        .unwrap();
        let values: Vec<u64> = outcomes.into_iter().map(|o| o.result.unwrap()).collect();
        assert_eq!(values, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_runner_isolates_errors_and_panics() {
        let jobs = vec![("ok".to_string(), 1), ("err".to_string(), 2), ("panic".to_string(), 3)];
        let failed = AtomicUsize::new(0);
        let outcomes = BatchRunner::new(2).run(
            jobs,
            |_, n| match n {
                2 => anyhow::bail!("bad folder"),
                3 => panic!("boom"),
                _ => Ok(n),
            },
            |_, status| {
                if status == JobStatus::Failed {
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result, Ok(1));
        assert_eq!(outcomes[1].result, Err("bad folder".to_string()));
        assert_eq!(outcomes[2].result, Err("panicked: boom".to_string()));
        assert_eq!(failed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_runner_with_no_jobs() {
        let outcomes: Vec<JobOutcome<()>> = BatchRunner::default().run(Vec::<(String, ())>::new(), |_, _| Ok(()), |_, _| {}).unwrap();
        assert!(outcomes.is_empty());
    }

    fn write_month(root: &Path, month: &str, file: &str, content: &str) {
        let dir = root.join(month);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_subfolder_merge_statuses() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_month(
            input.path(),
            "2024.01",
            "north.csv",
            "고유번호,지역,금액\nA,North,100\nA,North,200\nB,North,\n",
        );
        write_month(input.path(), "2024.02", "bad.csv", "이름,메모\nx,y\n");
        write_month(input.path(), "archive", "old.csv", "고유번호,지역,금액\nA,North,1\n");

        let ingest = IngestService::default();
        let sink = CsvSink::new(output.path());
        let merge = SubfolderMerge::new(&ingest, &sink);
        let runner = BatchRunner::new(2);

        let reports = merge.run(input.path(), &runner, |_, _| {}).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, FolderStatus::Saved);
        assert_eq!(reports[0].merged, 2);
        assert_eq!(reports[0].duplicates, 2);
        assert!(output.path().join("merged-2024.01").join("merged.csv").exists());
        assert_eq!(reports[1].status, FolderStatus::Failed);
        assert_eq!(reports[1].rejected.len(), 1);

        let again = merge.run(input.path(), &runner, |_, _| {}).unwrap();
        assert_eq!(again[0].status, FolderStatus::Skipped);

        let forced = SubfolderMerge::new(&ingest, &sink)
            .with_overwrite(true)
            .run(input.path(), &runner, |_, _| {})
            .unwrap();
        assert_eq!(forced[0].status, FolderStatus::Saved);
    }

    #[test]
    fn test_output_pattern() {
        let ingest = IngestService::default();
        let sink = CsvSink::new("out");
        let merge = SubfolderMerge::new(&ingest, &sink).with_output_pattern("tithe_{period}_merged");
        assert_eq!(merge.output_name(Period::new(2024, 7).unwrap()), "tithe_2024.07_merged");
    }
}
