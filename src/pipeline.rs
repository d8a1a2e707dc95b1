use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::config::RunSettings;
use crate::orchestrator::{self, Aggregate, SourceFailure};
use crate::persist::{PersistReport, persist};
use crate::sources::{ScrapeContext, SourceParser};
use crate::store::JobStore;

#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Scrape only; never touch the store.
    pub dry_run: bool,
    pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub sources: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub scraped: usize,
    pub dropped: usize,
    /// `None` when persistence was skipped.
    pub persisted: Option<PersistReport>,
}

impl RunSummary {
    fn from_aggregate(aggregate: &Aggregate) -> Self {
        let timed_out = aggregate.failed_sources().filter(|r| matches!(r.failure, Some(SourceFailure::TimedOut(_)))).count();
        Self {
            sources: aggregate.reports.len(),
            failed: aggregate.failed_sources().count() - timed_out,
            timed_out,
            scraped: aggregate.batch.len(),
            dropped: aggregate.dropped,
            persisted: None,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources ({} failed, {} timed out), {} jobs scraped, {} dropped",
            self.sources, self.failed, self.timed_out, self.scraped, self.dropped
        )?;
        match &self.persisted {
            Some(p) => write!(f, ", {} inserted, {} duplicates", p.inserted, p.duplicates),
            None => write!(f, ", nothing persisted"),
        }
    }
}

fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize data to JSON")?;
    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;
    Ok(())
}

/// One full run: scrape every source, then persist what is new.
///
/// `open_store` is only called when there is something to write, so an empty
/// scrape never connects to the database.
pub async fn run<F, Fut>(
    parsers: Vec<Arc<dyn SourceParser>>,
    ctx: Arc<ScrapeContext>,
    settings: &RunSettings,
    options: &RunOptions,
    open_store: F,
) -> Result<RunSummary>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Box<dyn JobStore>>>,
{
    let aggregate = orchestrator::run_all(parsers, ctx, settings).await;
    let mut summary = RunSummary::from_aggregate(&aggregate);

    if let Some(path) = &options.dump_path {
        save_json(path, &aggregate.batch)?;
        info!("Wrote {} jobs to {}", aggregate.batch.len(), path.display());
    }

    if aggregate.batch.is_empty() {
        warn!("No jobs scraped, nothing to save");
        return Ok(summary);
    }
    if options.dry_run {
        info!("Dry run, skipping persistence of {} jobs", aggregate.batch.len());
        return Ok(summary);
    }

    let store = open_store().await.context("Failed to open job store")?;
    summary.persisted = Some(persist(store.as_ref(), &aggregate.batch, settings).await?);
    Ok(summary)
}
