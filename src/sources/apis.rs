//! Boards that expose a JSON API instead of server-rendered listings.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::extract::{clean_html, parse_deadline};
use super::paginate::{self, CursorPage, OffsetPage, Pagination};
use super::{ScrapeContext, SourceParser};
use crate::fetch::{Body, FetchRequest};
use crate::models::{CareerHubResponse, GlorriPage, HrinPage, JobRecord, JobSearchPage, ProJobsPage, StaffyResponse};

fn json_as<T: DeserializeOwned>(body: Body) -> Result<T> {
    let value = body.into_json().ok_or_else(|| anyhow!("response is not JSON"))?;
    serde_json::from_value(value).context("unexpected response shape")
}

// --- jobsearch.az ---

pub struct JobSearchAz;

const JOBSEARCH_API: &str = "https://www.jobsearch.az/api-az/vacancies-az";
const JOBSEARCH_MAX_PAGES: usize = 5;

fn jobsearch_request(url: &str) -> FetchRequest {
    FetchRequest::get(url)
        .header("Accept", "application/json, text/plain, */*")
        .header("Referer", "https://www.jobsearch.az/vacancies")
        .header("X-Requested-With", "XMLHttpRequest")
}

#[async_trait]
impl SourceParser for JobSearchAz {
    fn name(&self) -> &'static str {
        "jobsearch_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: JOBSEARCH_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        // The next link already carries every filter parameter.
        let first = jobsearch_request(JOBSEARCH_API).query("hl", "az");
        paginate::next_cursor(ctx.fetcher(), first, JOBSEARCH_MAX_PAGES, |body| {
            let page: JobSearchPage = json_as(body)?;
            Ok(CursorPage {
                next: page.next.as_deref().filter(|n| !n.is_empty()).map(jobsearch_request),
                jobs: jobsearch_records(page),
            })
        })
        .await
    }
}

fn jobsearch_records(page: JobSearchPage) -> Vec<JobRecord> {
    page.items
        .into_iter()
        .map(|item| {
            let company = item.company.and_then(|c| c.title).unwrap_or_default();
            JobRecord::new(company, item.title, format!("https://www.jobsearch.az/vacancies/{}", item.slug))
                .with_function(item.category.and_then(|c| c.title))
                .with_deadline(item.deadline_at.as_deref().and_then(parse_deadline))
        })
        .collect()
}

// --- glorri.az ---

pub struct Glorri;

const GLORRI_API: &str = "https://atsapp.glorri.az/job-service/v2/jobs/public";
const GLORRI_PAGE_SIZE: usize = 18;
const GLORRI_MAX_ITEMS: usize = 540;

#[async_trait]
impl SourceParser for Glorri {
    fn name(&self) -> &'static str {
        "glorri"
    }

    fn pagination(&self) -> Pagination {
        Pagination::OffsetUntilEmpty { page_size: GLORRI_PAGE_SIZE, max_items: GLORRI_MAX_ITEMS }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        paginate::offset_until_empty(
            ctx.fetcher(),
            GLORRI_PAGE_SIZE,
            GLORRI_MAX_ITEMS,
            |offset| {
                FetchRequest::get(GLORRI_API)
                    .query("offset", offset.to_string())
                    .query("limit", GLORRI_PAGE_SIZE.to_string())
            },
            |body| {
                let page: GlorriPage = json_as(body)?;
                Ok(OffsetPage { total: page.total_count, jobs: glorri_records(page) })
            },
        )
        .await
    }
}

fn glorri_records(page: GlorriPage) -> Vec<JobRecord> {
    page.entities
        .into_iter()
        .map(|job| {
            let link = format!("https://jobs.glorri.az/vacancies/{}/{}/apply", job.company.slug, job.slug);
            JobRecord::new(job.company.name, job.title, link)
                .with_location(job.location)
                .with_schedule(job.job_type)
                .with_function(job.job_function)
        })
        .collect()
}

// --- careerhub.az ---

pub struct CareerHub;

const CAREERHUB_API: &str = "https://api.careerhub.az/graphql";
const CAREERHUB_MAX_PAGES: usize = 10;
const CAREERHUB_PAGE_SIZE: u32 = 50;
const CAREERHUB_QUERY: &str = "query Vacancies($page: Int!, $first: Int!) { vacancies(page: $page, first: $first) { \
    data { title slug city deadline employment company { name } } hasMorePages } }";

fn careerhub_request(page: u32) -> FetchRequest {
    FetchRequest::post_json(
        CAREERHUB_API,
        json!({ "query": CAREERHUB_QUERY, "variables": { "page": page, "first": CAREERHUB_PAGE_SIZE } }),
    )
    .header("Accept", "application/json")
}

#[async_trait]
impl SourceParser for CareerHub {
    fn name(&self) -> &'static str {
        "careerhub"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: CAREERHUB_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let mut page = 1;
        paginate::next_cursor(ctx.fetcher(), careerhub_request(page), CAREERHUB_MAX_PAGES, |body| {
            let response: CareerHubResponse = json_as(body)?;
            let vacancies = response.data.ok_or_else(|| anyhow!("GraphQL response without data"))?.vacancies;
            page += 1;
            Ok(CursorPage {
                next: vacancies.has_more_pages.then(|| careerhub_request(page)),
                jobs: vacancies
                    .data
                    .into_iter()
                    .map(|v| {
                        let company = v.company.and_then(|c| c.name).unwrap_or_default();
                        JobRecord::new(company, v.title, format!("https://careerhub.az/vacancies/{}", v.slug))
                            .with_location(v.city)
                            .with_schedule(v.employment)
                            .with_deadline(v.deadline.as_deref().and_then(parse_deadline))
                    })
                    .collect(),
            })
        })
        .await
    }
}

// --- hrin.az ---

pub struct Hrin;

const HRIN_API: &str = "https://api.hrin.az/api/v1/vacancies/";
const HRIN_MAX_PAGE: u32 = 10;

fn hrin_request(page: u32) -> FetchRequest {
    FetchRequest::get(HRIN_API).query("page", page.to_string())
}

/// Last page worth asking for, from the first page's `count` and size.
fn hrin_last_page(count: Option<usize>, page_len: usize) -> u32 {
    match count {
        _ if page_len == 0 => 1,
        Some(count) => u32::try_from(count.div_ceil(page_len)).unwrap_or(u32::MAX).clamp(1, HRIN_MAX_PAGE),
        None => HRIN_MAX_PAGE,
    }
}

#[async_trait]
impl SourceParser for Hrin {
    fn name(&self) -> &'static str {
        "hrin"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(1..=HRIN_MAX_PAGE)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let first = ctx.fetcher().fetch(hrin_request(1)).await?;
        let first: HrinPage = json_as(first).context("hrin first page")?;
        let last_page = hrin_last_page(first.count, first.results.len());
        let mut jobs = hrin_records(first);
        if last_page < 2 {
            return Ok(jobs);
        }

        let rest = paginate::fixed_range(ctx.fetcher(), 2..=last_page, ctx.concurrency, hrin_request, |page, body| {
            match json_as::<HrinPage>(body) {
                Ok(parsed) => hrin_records(parsed),
                Err(e) => {
                    warn!("hrin page {} skipped: {:#}", page, e);
                    Vec::new()
                }
            }
        })
        .await;
        match rest {
            Ok(more) => jobs.extend(more),
            Err(e) => warn!("hrin pages 2..={} unavailable: {:#}", last_page, e),
        }
        Ok(jobs)
    }
}

fn hrin_records(page: HrinPage) -> Vec<JobRecord> {
    page.results
        .into_iter()
        .map(|v| {
            JobRecord::new(v.company_name.unwrap_or_default(), v.title, format!("https://hrin.az/vacancy/{}", v.id))
                .with_location(v.location)
                .with_schedule(v.work_type)
                .with_function(v.category)
                .with_deadline(v.deadline.as_deref().and_then(parse_deadline))
                .with_description(v.description.as_deref().map(clean_html))
        })
        .collect()
}

// --- projobs.az ---

pub struct ProJobs;

const PROJOBS_API: &str = "https://core.projobs.az/v1/vacancies";
const PROJOBS_MAX_PAGES: usize = 10;

fn projobs_request(page: u32) -> FetchRequest {
    FetchRequest::get(PROJOBS_API).query("page", page.to_string()).header("Accept", "application/json")
}

#[async_trait]
impl SourceParser for ProJobs {
    fn name(&self) -> &'static str {
        "projobs"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: PROJOBS_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let mut page = 1;
        paginate::next_cursor(ctx.fetcher(), projobs_request(page), PROJOBS_MAX_PAGES, |body| {
            let parsed: ProJobsPage = json_as(body)?;
            let last_page = parsed.meta.as_ref().and_then(|m| m.last_page).unwrap_or(page);
            page += 1;
            let more = page <= last_page && !parsed.data.is_empty();
            Ok(CursorPage { next: more.then(|| projobs_request(page)), jobs: projobs_records(parsed) })
        })
        .await
    }
}

fn projobs_records(page: ProJobsPage) -> Vec<JobRecord> {
    page.data
        .into_iter()
        .map(|v| {
            JobRecord::new(v.company_name.unwrap_or_default(), v.name, format!("https://projobs.az/jobdetails/{}", v.id))
                .with_location(v.city_name)
                .with_schedule(v.job_type_name)
                .with_deadline(v.deadline.as_deref().and_then(parse_deadline))
        })
        .collect()
}

// --- staffy.az ---

pub struct Staffy;

const STAFFY_API: &str = "https://api.staffy.az/graphql";
const STAFFY_MAX_PAGES: usize = 10;
const STAFFY_PAGE_SIZE: u32 = 50;
const STAFFY_QUERY: &str = "query Jobs($first: Int!, $after: String) { jobs(first: $first, after: $after) { \
    edges { node { id title location employmentType expiresAt company { name } } } pageInfo { hasNextPage endCursor } } }";

fn staffy_request(after: Option<&str>) -> FetchRequest {
    FetchRequest::post_json(
        STAFFY_API,
        json!({ "query": STAFFY_QUERY, "variables": { "first": STAFFY_PAGE_SIZE, "after": after } }),
    )
    .header("Accept", "application/json")
}

#[async_trait]
impl SourceParser for Staffy {
    fn name(&self) -> &'static str {
        "staffy"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: STAFFY_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        paginate::next_cursor(ctx.fetcher(), staffy_request(None), STAFFY_MAX_PAGES, |body| {
            let response: StaffyResponse = json_as(body)?;
            let jobs = response.data.ok_or_else(|| anyhow!("GraphQL response without data"))?.jobs;
            let next = match (jobs.page_info.has_next_page, jobs.page_info.end_cursor.as_deref()) {
                (true, Some(cursor)) => Some(staffy_request(Some(cursor))),
                _ => None,
            };
            Ok(CursorPage {
                next,
                jobs: jobs
                    .edges
                    .into_iter()
                    .map(|edge| {
                        let job = edge.node;
                        let company = job.company.and_then(|c| c.name).unwrap_or_default();
                        JobRecord::new(company, job.title, format!("https://staffy.az/job/{}", job.id))
                            .with_location(job.location)
                            .with_schedule(job.employment_type)
                            .with_deadline(job.expires_at.as_deref().and_then(parse_deadline))
                    })
                    .collect(),
            })
        })
        .await
    }
}
