//! Runs every source concurrently and merges what comes back into one batch.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::timeout;

use crate::config::RunSettings;
use crate::models::{JobRecord, ScrapeBatch};
use crate::sources::{ScrapeContext, SourceParser};

#[derive(Debug, thiserror::Error)]
pub enum SourceFailure {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("{0:#}")]
    Failed(anyhow::Error),
    /// The task itself died (aborted or panicked outside the guard).
    #[error("task lost: {0}")]
    Lost(String),
}

#[derive(Debug)]
pub struct SourceReport {
    pub source: &'static str,
    pub failure: Option<SourceFailure>,
}

pub struct Aggregate {
    pub batch: ScrapeBatch,
    pub reports: Vec<SourceReport>,
    /// Records discarded for lacking a company or a title.
    pub dropped: usize,
}

impl Aggregate {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| r.failure.is_some())
    }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#> -"));
    }
    pb
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one parser with its own deadline. Panics are caught here so they stay local to the source.
async fn run_source(parser: &dyn SourceParser, ctx: &ScrapeContext, limit: Duration) -> Result<Vec<JobRecord>, SourceFailure> {
    let guarded = AssertUnwindSafe(parser.parse(ctx)).catch_unwind();
    match timeout(limit, guarded).await {
        Err(_) => Err(SourceFailure::TimedOut(limit)),
        Ok(Err(payload)) => Err(SourceFailure::Panicked(panic_message(payload))),
        Ok(Ok(Err(e))) => Err(SourceFailure::Failed(e)),
        Ok(Ok(Ok(jobs))) => Ok(jobs),
    }
}

/// Scrapes all `parsers` at once. A failing source contributes nothing and
/// never aborts the others.
pub async fn run_all(parsers: Vec<Arc<dyn SourceParser>>, ctx: Arc<ScrapeContext>, settings: &RunSettings) -> Aggregate {
    let scrape_date = Utc::now();
    let pb = progress_bar(parsers.len(), settings.show_progress);
    info!("Scraping {} sources...", parsers.len());

    let mut tasks = JoinSet::new();
    let mut names = HashMap::new();
    for parser in parsers {
        let ctx = ctx.clone();
        let limit = settings.source_timeout;
        let name = parser.name();
        let handle = tasks.spawn(async move {
            debug!("{}: starting ({})", parser.name(), parser.pagination());
            let started = Instant::now();
            let outcome = run_source(parser.as_ref(), &ctx, limit).await;
            (parser.name(), outcome, started.elapsed())
        });
        names.insert(handle.id(), name);
    }

    let mut records = Vec::new();
    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let report = match joined {
            Ok((source, Ok(jobs), elapsed)) => {
                info!("{}: {} jobs in {:.1?}", source, jobs.len(), elapsed);
                records.extend(jobs);
                SourceReport { source, failure: None }
            }
            Ok((source, Err(failure), elapsed)) => {
                error!("{}: {} (after {:.1?})", source, failure, elapsed);
                SourceReport { source, failure: Some(failure) }
            }
            Err(e) => lost_report(&names, e),
        };
        reports.push(report);

        pb.inc(1);
        pb.set_message(format!("Jobs: {} | Failures: {}", records.len(), reports.iter().filter(|r| r.failure.is_some()).count()));
    }

    let (batch, dropped) = build_batch(records, scrape_date);
    pb.finish_with_message(format!("Done! {} jobs.", batch.len()));
    if dropped > 0 {
        info!("Dropped {} records without company or title", dropped);
    }

    Aggregate { batch, reports, dropped }
}

/// Reports a task that never handed back its outcome under the source it was spawned for.
fn lost_report(names: &HashMap<Id, &'static str>, err: JoinError) -> SourceReport {
    let source = names.get(&err.id()).copied().unwrap_or("unknown");
    error!("{}: task lost: {}", source, err);
    SourceReport { source, failure: Some(SourceFailure::Lost(err.to_string())) }
}

/// Stamps every usable record with the run time. Returns the batch and how many were dropped.
pub fn build_batch(records: Vec<JobRecord>, scrape_date: DateTime<Utc>) -> (ScrapeBatch, usize) {
    let total = records.len();
    let records: Vec<JobRecord> = records
        .into_iter()
        .filter(JobRecord::is_usable)
        .map(|mut record| {
            record.scrape_date = Some(scrape_date);
            record
        })
        .collect();
    let dropped = total - records.len();
    (ScrapeBatch { scrape_date, records }, dropped)
}
