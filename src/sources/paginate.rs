//! The three looping templates every paginated source follows.
//!
//! Extraction callbacks are synchronous: parsed HTML documents are not `Send`
//! and must never live across an await point.

use std::fmt;
use std::future::Future;
use std::ops::RangeInclusive;

use anyhow::{Result, anyhow};
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use crate::fetch::{Body, Fetch, FetchRequest};
use crate::models::JobRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    Single,
    FixedRange(RangeInclusive<u32>),
    NextCursor { max_pages: usize },
    OffsetUntilEmpty { page_size: usize, max_items: usize },
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pagination::Single => write!(f, "single page"),
            Pagination::FixedRange(pages) => write!(f, "pages {}..={}", pages.start(), pages.end()),
            Pagination::NextCursor { max_pages } => write!(f, "next cursor, up to {} pages", max_pages),
            Pagination::OffsetUntilEmpty { page_size, max_items } => {
                write!(f, "offset by {}, up to {} items", page_size, max_items)
            }
        }
    }
}

/// One step of a cursor walk: the jobs on this page and the request for the next one.
pub struct CursorPage {
    pub jobs: Vec<JobRecord>,
    pub next: Option<FetchRequest>,
}

pub struct OffsetPage {
    pub jobs: Vec<JobRecord>,
    pub total: Option<usize>,
}

/// Fetches every page of a fixed range concurrently. Page order does not matter.
/// Fails only when every page failed.
pub async fn fixed_range<R, E>(
    fetcher: &dyn Fetch,
    pages: RangeInclusive<u32>,
    concurrency: usize,
    request: R,
    extract: E,
) -> Result<Vec<JobRecord>>
where
    R: Fn(u32) -> FetchRequest,
    E: Fn(u32, Body) -> Vec<JobRecord>,
{
    let responses: Vec<_> = stream::iter(pages)
        .map(|page| {
            let req = request(page);
            async move { (page, fetcher.fetch(req).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let total = responses.len();
    let mut failures = 0;
    let mut last_error = None;
    let mut jobs = Vec::new();
    for (page, response) in responses {
        match response {
            Ok(body) => {
                let found = extract(page, body);
                debug!("page {}: {} jobs", page, found.len());
                jobs.extend(found);
            }
            Err(e) => {
                warn!("page {} unavailable: {}", page, e);
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == total => Err(anyhow!(e).context("every page failed")),
        _ => Ok(jobs),
    }
}

/// Follows a "next page" cursor sequentially; each request depends on the previous response.
pub async fn next_cursor<S>(fetcher: &dyn Fetch, first: FetchRequest, max_pages: usize, mut step: S) -> Result<Vec<JobRecord>>
where
    S: FnMut(Body) -> Result<CursorPage>,
{
    let mut jobs = Vec::new();
    let mut next = Some(first);
    let mut page = 0;

    while let Some(request) = next.take() {
        if page >= max_pages {
            debug!("stopping after {} pages", page);
            break;
        }
        let url = request.url.clone();
        let outcome = match fetcher.fetch(request).await {
            Ok(body) => step(body),
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(parsed) => {
                jobs.extend(parsed.jobs);
                next = parsed.next;
            }
            Err(e) if page == 0 => return Err(e.context(format!("first page {} failed", url))),
            Err(e) => {
                warn!("cursor walk stopped at page {} ({}): {:#}", page + 1, url, e);
                break;
            }
        }
        page += 1;
    }
    Ok(jobs)
}

/// Pages by numeric offset until a page comes back empty, the reported total is
/// reached, or `max_items` is hit.
pub async fn offset_until_empty<R, E>(
    fetcher: &dyn Fetch,
    page_size: usize,
    max_items: usize,
    request: R,
    mut extract: E,
) -> Result<Vec<JobRecord>>
where
    R: Fn(usize) -> FetchRequest,
    E: FnMut(Body) -> Result<OffsetPage>,
{
    let mut jobs = Vec::new();
    let mut offset = 0;

    while offset < max_items {
        let outcome = match fetcher.fetch(request(offset)).await {
            Ok(body) => extract(body),
            Err(e) => Err(e.into()),
        };
        let parsed = match outcome {
            Ok(parsed) => parsed,
            Err(e) if offset == 0 => return Err(e.context("first page failed")),
            Err(e) => {
                warn!("offset walk stopped at {}: {:#}", offset, e);
                break;
            }
        };
        if parsed.jobs.is_empty() {
            break;
        }
        jobs.extend(parsed.jobs);
        offset += page_size;
        if parsed.total.is_some_and(|total| offset >= total) {
            break;
        }
    }
    Ok(jobs)
}

/// Runs a per-listing detail fetch for every record, `concurrency` at a time.
pub async fn enrich_details<F, Fut>(records: Vec<JobRecord>, concurrency: usize, enrich: F) -> Vec<JobRecord>
where
    F: Fn(JobRecord) -> Fut,
    Fut: Future<Output = JobRecord>,
{
    stream::iter(records).map(enrich).buffer_unordered(concurrency.max(1)).collect().await
}
