//! Aggregator job boards. Each listing names its own company.

use std::ops::RangeInclusive;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use scraper::{ElementRef, Html, Selector};

use super::extract::{clean_html, normalize_link, own_attr, parse_deadline, sel, select_attr, select_text, text_of};
use super::paginate::{self, CursorPage, Pagination, enrich_details};
use super::{ScrapeContext, SourceParser};
use crate::fetch::{Fetch, FetchRequest};
use crate::models::JobRecord;

/// Company, title and link selectors shared by most board layouts.
struct ListingSelectors {
    item: Selector,
    title: Selector,
    company: Selector,
    link: Selector,
}

impl ListingSelectors {
    fn new(item: &str, title: &str, company: &str, link: &str) -> Self {
        Self { item: sel(item), title: sel(title), company: sel(company), link: sel(link) }
    }

    /// `extra` adds per-board optional fields on top of the shared ones.
    fn extract<F>(&self, html: &str, base: &str, extra: F) -> Vec<JobRecord>
    where
        F: Fn(ElementRef<'_>, JobRecord) -> JobRecord,
    {
        let doc = Html::parse_document(html);
        doc.select(&self.item)
            .map(|item| {
                // The item itself is the anchor on some boards.
                let href = select_attr(item, &self.link, "href").or_else(|| own_attr(item, "href")).unwrap_or_default();
                let record = JobRecord::new(
                    select_text(item, &self.company).unwrap_or_default(),
                    select_text(item, &self.title).unwrap_or_default(),
                    normalize_link(base, &href),
                );
                extra(item, record)
            })
            .collect()
    }
}

async fn html_pages<P>(ctx: &ScrapeContext, pages: RangeInclusive<u32>, url: impl Fn(u32) -> String, parse: P) -> Result<Vec<JobRecord>>
where
    P: Fn(&str) -> Vec<JobRecord>,
{
    paginate::fixed_range(
        ctx.fetcher(),
        pages,
        ctx.concurrency,
        |page| FetchRequest::get(url(page)).browser_headers(),
        |_, body| parse(&body.into_text()),
    )
    .await
}

/// Cursor walk over HTML pages where the next page is a link in the markup.
async fn html_cursor<P>(ctx: &ScrapeContext, start: &str, max_pages: usize, next_link: &str, parse: P) -> Result<Vec<JobRecord>>
where
    P: Fn(&str) -> Vec<JobRecord>,
{
    let next_selector = sel(next_link);
    // Relative next links are relative to the page they appear on.
    let mut current = start.to_string();
    paginate::next_cursor(ctx.fetcher(), FetchRequest::get(start).browser_headers(), max_pages, move |body| {
        let html = body.into_text();
        let next = {
            let doc = Html::parse_document(&html);
            select_attr(doc.root_element(), &next_selector, "href")
        };
        let next = next.map(|href| {
            current = normalize_link(&current, &href);
            FetchRequest::get(current.as_str()).browser_headers()
        });
        Ok(CursorPage { jobs: parse(&html), next })
    })
    .await
}

// --- boss.az ---

pub struct BossAz;

const BOSS_BASE: &str = "https://boss.az";
const BOSS_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for BossAz {
    fn name(&self) -> &'static str {
        "boss_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(BOSS_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, BOSS_PAGES, |page| format!("{}/vacancies?page={}", BOSS_BASE, page), parse_boss).await
    }
}

fn parse_boss(html: &str) -> Vec<JobRecord> {
    ListingSelectors::new(".results-i", "h3.results-i-title", "a.results-i-company", "a.results-i-link")
        .extract(html, BOSS_BASE, |_, record| record)
}

// --- hellojob.az ---

pub struct HelloJob;

const HELLOJOB_BASE: &str = "https://www.hellojob.az";
const HELLOJOB_PAGES: RangeInclusive<u32> = 1..=10;

#[async_trait]
impl SourceParser for HelloJob {
    fn name(&self) -> &'static str {
        "hellojob"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(HELLOJOB_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, HELLOJOB_PAGES, |page| format!("{}/vakansiyalar?page={}", HELLOJOB_BASE, page), parse_hellojob).await
    }
}

fn parse_hellojob(html: &str) -> Vec<JobRecord> {
    let schedule = sel(".vacancies__type");
    ListingSelectors::new("a.vacancies__item", "h3", ".vacancies__company", "a.vacancies__apply")
        .extract(html, HELLOJOB_BASE, |item, record| record.with_schedule(select_text(item, &schedule)))
}

// --- smartjob.az ---

pub struct SmartJob;

const SMARTJOB_BASE: &str = "https://smartjob.az";
const SMARTJOB_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for SmartJob {
    fn name(&self) -> &'static str {
        "smartjob"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(SMARTJOB_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, SMARTJOB_PAGES, |page| format!("{}/vacancies?page={}", SMARTJOB_BASE, page), parse_smartjob).await
    }
}

fn parse_smartjob(html: &str) -> Vec<JobRecord> {
    let (location, deadline) = (sel(".brows-job-location"), sel(".brows-job-deadline"));
    ListingSelectors::new(".brows-job-list", ".brows-job-position h3 a", ".company-title a", ".brows-job-position h3 a")
        .extract(html, SMARTJOB_BASE, |item, record| {
            record
                .with_location(select_text(item, &location))
                .with_deadline(select_text(item, &deadline).and_then(|d| parse_deadline(&d)))
        })
}

// --- jobbox.az ---

pub struct JobBox;

const JOBBOX_BASE: &str = "https://jobbox.az";
const JOBBOX_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for JobBox {
    fn name(&self) -> &'static str {
        "jobbox"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(JOBBOX_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, JOBBOX_PAGES, |page| format!("{}/az/vacancies?page={}", JOBBOX_BASE, page), parse_jobbox).await
    }
}

fn parse_jobbox(html: &str) -> Vec<JobRecord> {
    let city = sel(".list__item__city");
    ListingSelectors::new("li.list__item", ".list__item__title", ".list__item__company", "a.list__item__text")
        .extract(html, JOBBOX_BASE, |item, record| record.with_location(select_text(item, &city)))
}

// --- position.az ---

pub struct PositionAz;

const POSITION_URL: &str = "https://position.az";

#[async_trait]
impl SourceParser for PositionAz {
    fn name(&self) -> &'static str {
        "position_az"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(POSITION_URL).browser_headers().insecure()).await?;
        Ok(parse_position(&body.into_text()))
    }
}

fn parse_position(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (vacancy, company, date) = (sel("td.vacancy a"), sel("td.company"), sel("td.date"));

    doc.select(&sel("table.prodlist tr"))
        .filter_map(|row| {
            // Header rows carry no vacancy link.
            let anchor = row.select(&vacancy).next()?;
            let href = own_attr(anchor, "href").unwrap_or_default();
            Some(
                JobRecord::new(select_text(row, &company).unwrap_or_default(), text_of(anchor), normalize_link(POSITION_URL, &href))
                    .with_deadline(select_text(row, &date).and_then(|d| parse_deadline(&d))),
            )
        })
        .collect()
}

// --- vakansiya.az ---

pub struct VakansiyaAz;

const VAKANSIYA_URL: &str = "https://www.vakansiya.az/az/";

#[async_trait]
impl SourceParser for VakansiyaAz {
    fn name(&self) -> &'static str {
        "vakansiya_az"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(VAKANSIYA_URL).browser_headers().insecure()).await?;
        Ok(parse_vakansiya(&body.into_text()))
    }
}

fn parse_vakansiya(html: &str) -> Vec<JobRecord> {
    let date = sel(".date");
    ListingSelectors::new("#js-jobs-wrapper .js-fields", "a.title", ".company", "a.title")
        .extract(html, VAKANSIYA_URL, |item, record| {
            record.with_deadline(select_text(item, &date).and_then(|d| parse_deadline(&d)))
        })
}

// --- banker.az ---

pub struct BankerAz;

const BANKER_START: &str = "https://banker.az/vakansiyalar/";
const BANKER_MAX_PAGES: usize = 10;

#[async_trait]
impl SourceParser for BankerAz {
    fn name(&self) -> &'static str {
        "banker_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: BANKER_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_cursor(ctx, BANKER_START, BANKER_MAX_PAGES, "a.next.page-numbers", parse_banker).await
    }
}

fn parse_banker(html: &str) -> Vec<JobRecord> {
    let date = sel(".job-date");
    ListingSelectors::new(".list-data", ".job-info h3 a", ".company-info", ".job-info h3 a")
        .extract(html, BANKER_START, |item, record| {
            record.with_deadline(select_text(item, &date).and_then(|d| parse_deadline(&d)))
        })
}

// --- offer.az ---

pub struct OfferAz;

const OFFER_BASE: &str = "https://www.offer.az";
const OFFER_PAGES: RangeInclusive<u32> = 1..=3;

#[async_trait]
impl SourceParser for OfferAz {
    fn name(&self) -> &'static str {
        "offer_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(OFFER_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let listings = html_pages(ctx, OFFER_PAGES, |page| format!("{}/is-elanlari/page/{}/", OFFER_BASE, page), parse_offer).await?;
        debug!("offer.az: {} listings, fetching details", listings.len());

        let fetcher = ctx.fetcher();
        Ok(enrich_details(listings, ctx.concurrency, move |record| offer_detail(fetcher, record)).await)
    }
}

fn parse_offer(html: &str) -> Vec<JobRecord> {
    let location = sel(".job-card__location");
    ListingSelectors::new(".job-card", "a.job-card__title", ".job-card__company", "a.job-card__title")
        .extract(html, OFFER_BASE, |item, record| record.with_location(select_text(item, &location)))
}

async fn offer_detail(fetcher: &dyn Fetch, record: JobRecord) -> JobRecord {
    if record.apply_link.is_empty() {
        return record;
    }
    match fetcher.fetch(FetchRequest::get(record.apply_link.as_str()).browser_headers().retries(1)).await {
        Ok(body) => {
            let (deadline, description) = parse_offer_detail(&body.into_text());
            record.with_deadline(deadline).with_description(description)
        }
        Err(e) => {
            debug!("offer.az detail unavailable for {}: {}", record.apply_link, e);
            record
        }
    }
}

fn parse_offer_detail(html: &str) -> (Option<chrono::NaiveDate>, Option<String>) {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    let deadline = select_text(root, &sel(".job-detail__deadline")).and_then(|d| parse_deadline(&d));
    let description = root
        .select(&sel(".job-detail__content"))
        .next()
        .map(|c| clean_html(&c.inner_html()));
    (deadline, description)
}

// --- busy.az ---

pub struct BusyAz;

const BUSY_BASE: &str = "https://busy.az";
const BUSY_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for BusyAz {
    fn name(&self) -> &'static str {
        "busy_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(BUSY_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, BUSY_PAGES, |page| format!("{}/vacancies?page={}", BUSY_BASE, page), parse_busy).await
    }
}

fn parse_busy(html: &str) -> Vec<JobRecord> {
    let (location, schedule) = (sel(".job-listing-footer .location"), sel(".job-listing-footer .schedule"));
    ListingSelectors::new("a.job-listing", "h3.job-listing-title", ".job-listing-company", "a.job-listing-apply")
        .extract(html, BUSY_BASE, |item, record| {
            record.with_location(select_text(item, &location)).with_schedule(select_text(item, &schedule))
        })
}

// --- ejob.az ---

pub struct EjobAz;

const EJOB_URL: &str = "https://ejob.az/is-elanlari/";

#[async_trait]
impl SourceParser for EjobAz {
    fn name(&self) -> &'static str {
        "ejob_az"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(EJOB_URL).browser_headers()).await?;
        Ok(parse_ejob(&body.into_text()))
    }
}

fn parse_ejob(html: &str) -> Vec<JobRecord> {
    let category = sel(".vacancy__category");
    ListingSelectors::new("div.vacancy", ".vacancy__title a", ".vacancy__company", ".vacancy__title a")
        .extract(html, EJOB_URL, |item, record| record.with_function(select_text(item, &category)))
}

// --- isveren.az ---

pub struct IsverenAz;

const ISVEREN_START: &str = "https://isveren.az/vakansiyalar";
const ISVEREN_MAX_PAGES: usize = 5;

#[async_trait]
impl SourceParser for IsverenAz {
    fn name(&self) -> &'static str {
        "isveren_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: ISVEREN_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_cursor(ctx, ISVEREN_START, ISVEREN_MAX_PAGES, "a[rel=next]", parse_isveren).await
    }
}

fn parse_isveren(html: &str) -> Vec<JobRecord> {
    let (city, schedule) = (sel(".job-item__city"), sel(".job-item__type"));
    ListingSelectors::new(".job-item", ".job-item__title a", ".job-item__company", ".job-item__title a")
        .extract(html, ISVEREN_START, |item, record| {
            record.with_location(select_text(item, &city)).with_schedule(select_text(item, &schedule))
        })
}

// --- ishelanlari.az ---

pub struct IsElanlariAz;

const ISHELANLARI_BASE: &str = "https://ishelanlari.az";
const ISHELANLARI_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for IsElanlariAz {
    fn name(&self) -> &'static str {
        "ishelanlari_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(ISHELANLARI_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, ISHELANLARI_PAGES, |page| format!("{}/az/vacancies/0/0/{}", ISHELANLARI_BASE, page), parse_ishelanlari).await
    }
}

fn parse_ishelanlari(html: &str) -> Vec<JobRecord> {
    let (location, deadline) = (sel(".city"), sel(".time"));
    ListingSelectors::new(".card-body", "h2.font-weight-bold", ".company", "a")
        .extract(html, ISHELANLARI_BASE, |item, record| {
            record
                .with_location(select_text(item, &location))
                .with_deadline(select_text(item, &deadline).and_then(|d| parse_deadline(&d)))
        })
}

// --- vakansiya.biz ---

pub struct VakansiyaBiz;

const VAKANSIYA_BIZ_START: &str = "https://vakansiya.biz/az/vakansiyalar";
const VAKANSIYA_BIZ_MAX_PAGES: usize = 10;

#[async_trait]
impl SourceParser for VakansiyaBiz {
    fn name(&self) -> &'static str {
        "vakansiya_biz"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: VAKANSIYA_BIZ_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_cursor(ctx, VAKANSIYA_BIZ_START, VAKANSIYA_BIZ_MAX_PAGES, "ul.pagination a[rel=next]", parse_vakansiya_biz).await
    }
}

fn parse_vakansiya_biz(html: &str) -> Vec<JobRecord> {
    let category = sel(".vacancy-category");
    ListingSelectors::new("div.vacancy-list-item", ".vacancy-title a", ".vacancy-company", ".vacancy-title a")
        .extract(html, VAKANSIYA_BIZ_START, |item, record| record.with_function(select_text(item, &category)))
}

// --- hh1.az ---

pub struct Hh1Az;

const HH1_BASE: &str = "https://hh1.az";
const HH1_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for Hh1Az {
    fn name(&self) -> &'static str {
        "hh1_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(HH1_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, HH1_PAGES, |page| format!("{}/search/vacancy?page={}", HH1_BASE, page - 1), parse_hh1).await
    }
}

fn parse_hh1(html: &str) -> Vec<JobRecord> {
    let (location, schedule) = (sel("[data-qa=vacancy-serp__vacancy-address]"), sel("[data-qa=vacancy-serp__vacancy-work-schedule]"));
    ListingSelectors::new(
        ".vacancy-serp-item",
        "[data-qa=serp-item__title]",
        "[data-qa=vacancy-serp__vacancy-employer]",
        "a[data-qa=serp-item__title]",
    )
    .extract(html, HH1_BASE, |item, record| {
        record.with_location(select_text(item, &location)).with_schedule(select_text(item, &schedule))
    })
}

// --- 1is.az ---

pub struct OneIsAz;

const ONE_IS_BASE: &str = "https://1is.az";
const ONE_IS_PAGES: RangeInclusive<u32> = 1..=5;

#[async_trait]
impl SourceParser for OneIsAz {
    fn name(&self) -> &'static str {
        "1is_az"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(ONE_IS_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, ONE_IS_PAGES, |page| format!("{}/?page={}", ONE_IS_BASE, page), parse_one_is).await
    }
}

fn parse_one_is(html: &str) -> Vec<JobRecord> {
    let deadline = sel(".vac-inner3 .vac-time");
    ListingSelectors::new(".vac-card", "a.vac-name", ".vac-inner1 a", "a.vac-name")
        .extract(html, ONE_IS_BASE, |item, record| {
            record.with_deadline(select_text(item, &deadline).and_then(|d| parse_deadline(&d)))
        })
}

// --- talhunt.az ---

pub struct TalhuntAz;

const TALHUNT_URL: &str = "https://talhunt.az/vacancies";

#[async_trait]
impl SourceParser for TalhuntAz {
    fn name(&self) -> &'static str {
        "talhunt_az"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(TALHUNT_URL).browser_headers()).await?;
        Ok(parse_talhunt(&body.into_text()))
    }
}

fn parse_talhunt(html: &str) -> Vec<JobRecord> {
    let (location, schedule) = (sel(".job-card__location"), sel(".job-card__type"));
    ListingSelectors::new(".job-card", ".job-card__title", ".job-card__company", "a.job-card__link")
        .extract(html, TALHUNT_URL, |item, record| {
            record.with_location(select_text(item, &location)).with_schedule(select_text(item, &schedule))
        })
}

// --- isqure.az ---

pub struct IsQure;

const ISQURE_BASE: &str = "https://isqure.az";
const ISQURE_PAGES: RangeInclusive<u32> = 1..=3;

#[async_trait]
impl SourceParser for IsQure {
    fn name(&self) -> &'static str {
        "isqure"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FixedRange(ISQURE_PAGES)
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_pages(ctx, ISQURE_PAGES, |page| format!("{}/vakansiyalar?page={}", ISQURE_BASE, page), parse_isqure).await
    }
}

fn parse_isqure(html: &str) -> Vec<JobRecord> {
    let location = sel(".vacancy__city");
    ListingSelectors::new("a.vacancy", ".vacancy__title", ".vacancy__company", "a.vacancy__apply")
        .extract(html, ISQURE_BASE, |item, record| record.with_location(select_text(item, &location)))
}

// --- hrcbaku.com ---

pub struct HrcBaku;

const HRCBAKU_URL: &str = "https://hrcbaku.com/jobs-1";

#[async_trait]
impl SourceParser for HrcBaku {
    fn name(&self) -> &'static str {
        "hrcbaku"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(HRCBAKU_URL).browser_headers()).await?;
        Ok(parse_hrcbaku(&body.into_text()))
    }
}

/// HRC posts on behalf of clients it does not name.
fn parse_hrcbaku(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, link, location) = (sel(".tn-atom"), sel("a"), sel(".job-location"));

    doc.select(&sel(".t-rec .job-item"))
        .map(|item| {
            let href = select_attr(item, &link, "href").unwrap_or_default();
            JobRecord::new("HRC Baku", select_text(item, &title).unwrap_or_default(), normalize_link(HRCBAKU_URL, &href))
                .with_location(select_text(item, &location))
        })
        .collect()
}

// --- is-elanlari.iilkin.com ---

pub struct Iilkin;

const IILKIN_START: &str = "http://is-elanlari.iilkin.com/vakansiyalar/";
const IILKIN_MAX_PAGES: usize = 5;

#[async_trait]
impl SourceParser for Iilkin {
    fn name(&self) -> &'static str {
        "iilkin"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: IILKIN_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_cursor(ctx, IILKIN_START, IILKIN_MAX_PAGES, "a.next.page-numbers", parse_iilkin).await
    }
}

fn parse_iilkin(html: &str) -> Vec<JobRecord> {
    let date = sel(".job-date");
    ListingSelectors::new("article.job", "h2.entry-title a", ".job-company", "h2.entry-title a")
        .extract(html, IILKIN_START, |item, record| {
            record.with_deadline(select_text(item, &date).and_then(|d| parse_deadline(&d)))
        })
}

// --- unjobs.org ---

pub struct UnJobs;

const UNJOBS_START: &str = "https://unjobs.org/duty_stations/baku";
const UNJOBS_MAX_PAGES: usize = 3;

#[async_trait]
impl SourceParser for UnJobs {
    fn name(&self) -> &'static str {
        "unjobs"
    }

    fn pagination(&self) -> Pagination {
        Pagination::NextCursor { max_pages: UNJOBS_MAX_PAGES }
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        html_cursor(ctx, UNJOBS_START, UNJOBS_MAX_PAGES, "a.ts[rel=next]", parse_unjobs).await
    }
}

/// Listings read "Title" followed by the agency on its own line.
fn parse_unjobs(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (link, agency) = (sel("a.jtitle"), sel("br + span, .agency"));

    doc.select(&sel("div.job"))
        .filter_map(|item| {
            let anchor = item.select(&link).next()?;
            let href = own_attr(anchor, "href").unwrap_or_default();
            Some(JobRecord::new(select_text(item, &agency).unwrap_or_default(), text_of(anchor), normalize_link(UNJOBS_START, &href)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubFetcher;
    use crate::sources::test_context;
    use chrono::NaiveDate;

    fn boss_page(titles: &[&str]) -> String {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    r#"<div class="results-i"><h3 class="results-i-title">{t}</h3>
                    <a class="results-i-company" href="/companies/{i}">Company {i}</a>
                    <a class="results-i-link" href="/vacancies/{i}"></a></div>"#
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_boss_fetches_all_pages_and_survives_a_failed_one() {
        let mut fetcher = StubFetcher::new().with_status("https://boss.az/vacancies?page=3", 503);
        for page in [1, 2, 4, 5] {
            fetcher = fetcher.with_text(&format!("https://boss.az/vacancies?page={}", page), &boss_page(&["Driver", "Cook"]));
        }
        let (stub, ctx) = test_context(fetcher);

        let jobs = BossAz.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 8);
        assert_eq!(stub.recorded().len(), 5);
        assert!(jobs.iter().all(|j| j.apply_link.starts_with("https://boss.az/vacancies/")));
        assert!(jobs.iter().any(|j| j.company == "Company 1" && j.vacancy == "Cook"));
    }

    #[tokio::test]
    async fn test_boss_fails_when_site_is_down() {
        let (_, ctx) = test_context(StubFetcher::new());
        assert!(BossAz.parse(&ctx).await.is_err());
    }

    #[test]
    fn test_parse_hellojob_anchor_items() {
        let html = r#"<a class="vacancies__item" href="/vakansiya/backend-developer-42">
            <h3>Backend Developer</h3><p class="vacancies__company">Kontakt Home</p><span class="vacancies__type">Tam ştat</span></a>"#;
        let jobs = parse_hellojob(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].apply_link, "https://www.hellojob.az/vakansiya/backend-developer-42");
        assert_eq!(jobs[0].company, "Kontakt Home");
        assert_eq!(jobs[0].schedule.as_deref(), Some("Tam ştat"));
    }

    #[test]
    fn test_parse_smartjob() {
        let html = r#"<div class="brows-job-list">
            <div class="brows-job-position"><h3><a href="https://smartjob.az/vacancy/77">Accountant</a></h3></div>
            <div class="company-title"><a>Azersun Holding</a></div>
            <span class="brows-job-location">Bakı</span><span class="brows-job-deadline">05.01.2025</span></div>"#;
        let jobs = parse_smartjob(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].vacancy, "Accountant");
        assert_eq!(jobs[0].company, "Azersun Holding");
        assert_eq!(jobs[0].apply_link, "https://smartjob.az/vacancy/77");
        assert_eq!(jobs[0].deadline, NaiveDate::from_ymd_opt(2025, 1, 5));
    }

    #[test]
    fn test_parse_jobbox_missing_company_yields_unusable_record() {
        let html = r#"<ul><li class="list__item"><a class="list__item__text" href="/az/vacancies/9">
            <p class="list__item__title">Barista</p></a><span class="list__item__city">Bakı</span></li></ul>"#;
        let jobs = parse_jobbox(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].location.as_deref(), Some("Bakı"));
        assert!(!jobs[0].is_usable());
    }

    #[tokio::test]
    async fn test_position_skips_header_rows_and_disables_tls() {
        let html = r#"<table class="prodlist">
            <tr><th>Vakansiya</th><th>Şirkət</th></tr>
            <tr><td class="vacancy"><a href="/vacancy/1">Satış meneceri</a></td><td class="company">Baku Electronics</td><td class="date">12.12.2024</td></tr>
        </table>"#;
        let (stub, ctx) = test_context(StubFetcher::new().with_text(POSITION_URL, html));

        let jobs = PositionAz.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Baku Electronics");
        assert_eq!(jobs[0].apply_link, "https://position.az/vacancy/1");
        assert!(!stub.recorded()[0].verify_tls);
    }

    #[test]
    fn test_parse_vakansiya() {
        let html = r#"<div id="js-jobs-wrapper"><div class="js-fields">
            <a class="title" href="https://www.vakansiya.az/az/vacancy/5">Mühasib</a><span class="company">Veysəloğlu</span>
            <span class="date">20 dekabr 2024</span></div></div>"#;
        let jobs = parse_vakansiya(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Veysəloğlu");
        assert_eq!(jobs[0].deadline, NaiveDate::from_ymd_opt(2024, 12, 20));
    }

    #[tokio::test]
    async fn test_banker_follows_next_links() {
        let page = |title: &str, next: Option<&str>| {
            let next = next.map(|n| format!(r#"<a class="next page-numbers" href="{n}">»</a>"#)).unwrap_or_default();
            format!(
                r#"<div class="list-data"><div class="job-info"><h3><a href="https://banker.az/{title}/">{title}</a></h3></div>
                <div class="company-info">Unibank</div></div>{next}"#
            )
        };
        let fetcher = StubFetcher::new()
            .with_text(BANKER_START, &page("kassir", Some("/vakansiyalar/page/2/")))
            .with_text("https://banker.az/vakansiyalar/page/2/", &page("auditor", None));
        let (stub, ctx) = test_context(fetcher);

        let jobs = BankerAz.parse(&ctx).await.unwrap();
        let titles: Vec<_> = jobs.iter().map(|j| j.vacancy.as_str()).collect();
        assert_eq!(titles, vec!["kassir", "auditor"]);
        assert!(jobs.iter().all(|j| j.company == "Unibank"));
        assert_eq!(stub.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_cursor_resolves_relative_links_against_current_page() {
        let page = |title: &str, next: Option<&str>| {
            let next = next.map(|n| format!(r#"<a rel="next" href="{n}">»</a>"#)).unwrap_or_default();
            format!(
                r#"<div class="job-item"><h3 class="job-item__title"><a href="/vakansiya/{title}">{title}</a></h3>
                <span class="job-item__company">Port Baku</span></div>{next}"#
            )
        };
        let fetcher = StubFetcher::new()
            .with_text(ISVEREN_START, &page("a", Some("vakansiyalar/page/2/")))
            .with_text("https://isveren.az/vakansiyalar/page/2/", &page("b", Some("../3/")))
            .with_text("https://isveren.az/vakansiyalar/page/3/", &page("c", None));
        let (stub, ctx) = test_context(fetcher);

        let jobs = IsverenAz.parse(&ctx).await.unwrap();
        let titles: Vec<_> = jobs.iter().map(|j| j.vacancy.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        let urls: Vec<_> = stub.recorded().iter().map(|r| r.url.clone()).collect();
        assert_eq!(urls[2], "https://isveren.az/vakansiyalar/page/3/");
    }

    #[tokio::test]
    async fn test_offer_enriches_each_listing() {
        let listing = r#"<div class="job-card"><a class="job-card__title" href="/is-elanlari/hr-manager/">HR Manager</a>
            <p class="job-card__company">Bravo</p><span class="job-card__location">Bakı</span></div>"#;
        let detail = r#"<span class="job-detail__deadline">31.01.2025</span><div class="job-detail__content"><p>Hire people</p></div>"#;
        let fetcher = StubFetcher::new()
            .with_text("https://www.offer.az/is-elanlari/page/1/", listing)
            .with_text("https://www.offer.az/is-elanlari/page/2/", "<html></html>")
            .with_text("https://www.offer.az/is-elanlari/page/3/", "<html></html>")
            .with_text("https://www.offer.az/is-elanlari/hr-manager/", detail);
        let (_, ctx) = test_context(fetcher);

        let jobs = OfferAz.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].deadline, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(jobs[0].description.as_deref(), Some("<p>Hire people</p>"));
        assert_eq!(jobs[0].location.as_deref(), Some("Bakı"));
    }

    #[test]
    fn test_parse_busy_uses_item_href() {
        let html = r#"<a class="job-listing" href="/vacancy/31"><h3 class="job-listing-title">Courier</h3>
            <p class="job-listing-company">Wolt</p><ul class="job-listing-footer"><li class="location">Bakı</li><li class="schedule">Part-time</li></ul></a>"#;
        let jobs = parse_busy(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].apply_link, "https://busy.az/vacancy/31");
        assert_eq!(jobs[0].schedule.as_deref(), Some("Part-time"));
    }

    #[test]
    fn test_parse_ejob_and_isveren() {
        let ejob = r#"<div class="vacancy"><h2 class="vacancy__title"><a href="/is-elanlari/123/">Dizayner</a></h2>
            <span class="vacancy__company">Baku Media</span><span class="vacancy__category">Dizayn</span></div>"#;
        let jobs = parse_ejob(ejob);
        assert_eq!(jobs[0].apply_link, "https://ejob.az/is-elanlari/123/");
        assert_eq!(jobs[0].function.as_deref(), Some("Dizayn"));

        let isveren = r#"<div class="job-item"><h3 class="job-item__title"><a href="/vakansiya/55">Aşpaz</a></h3>
            <span class="job-item__company">Port Baku</span><span class="job-item__city">Bakı</span></div>"#;
        let jobs = parse_isveren(isveren);
        assert_eq!(jobs[0].apply_link, "https://isveren.az/vakansiya/55");
        assert_eq!(jobs[0].company, "Port Baku");
        assert_eq!(jobs[0].schedule, None);
    }

    #[tokio::test]
    async fn test_ishelanlari_reads_cards() {
        let card = r#"<div class="card-body"><a href="/az/vacancy/501"><h2 class="font-weight-bold">Anbardar</h2></a>
            <span class="company">Bazarstore</span><span class="city">Sumqayıt</span><span class="time">07.02.2025</span></div>"#;
        let mut fetcher = StubFetcher::new();
        for page in 1..=5 {
            let html = if page == 1 { card } else { "<html></html>" };
            fetcher = fetcher.with_text(&format!("https://ishelanlari.az/az/vacancies/0/0/{}", page), html);
        }
        let (_, ctx) = test_context(fetcher);

        let jobs = IsElanlariAz.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Bazarstore");
        assert_eq!(jobs[0].location.as_deref(), Some("Sumqayıt"));
        assert_eq!(jobs[0].apply_link, "https://ishelanlari.az/az/vacancy/501");
        assert_eq!(jobs[0].deadline, NaiveDate::from_ymd_opt(2025, 2, 7));
    }

    #[tokio::test]
    async fn test_vakansiya_biz_stops_without_next_link() {
        let html = r#"<div class="vacancy-list-item"><h3 class="vacancy-title"><a href="/az/vakansiya/9">Sürücü</a></h3>
            <span class="vacancy-company">Bolt</span><span class="vacancy-category">Nəqliyyat</span></div>
            <ul class="pagination"><li class="active">1</li></ul>"#;
        let (stub, ctx) = test_context(StubFetcher::new().with_text(VAKANSIYA_BIZ_START, html));

        let jobs = VakansiyaBiz.parse(&ctx).await.unwrap();
        assert_eq!(stub.recorded().len(), 1);
        assert_eq!(jobs[0].apply_link, "https://vakansiya.biz/az/vakansiya/9");
        assert_eq!(jobs[0].function.as_deref(), Some("Nəqliyyat"));
    }

    #[tokio::test]
    async fn test_hh1_pages_are_zero_based() {
        let item = r#"<div class="vacancy-serp-item"><a data-qa="serp-item__title" href="https://hh1.az/vacancy/100">Data Analyst</a>
            <a data-qa="vacancy-serp__vacancy-employer">Kontakt Home</a><div data-qa="vacancy-serp__vacancy-address">Bakı</div></div>"#;
        let mut fetcher = StubFetcher::new();
        for page in 0..5 {
            fetcher = fetcher.with_text(&format!("https://hh1.az/search/vacancy?page={}", page), item);
        }
        let (stub, ctx) = test_context(fetcher);

        let jobs = Hh1Az.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 5);
        assert!(stub.recorded().iter().any(|r| r.url.ends_with("page=0")));
        assert_eq!(jobs[0].company, "Kontakt Home");
        assert_eq!(jobs[0].location.as_deref(), Some("Bakı"));
    }

    #[test]
    fn test_parse_one_is_and_talhunt() {
        let one_is = r#"<div class="vac-card"><div class="vac-inner1"><a href="/company/4">Araz Supermarket</a></div>
            <a class="vac-name" href="/vakansiya/77">Satıcı</a><div class="vac-inner3"><span class="vac-time">12.03.2025</span></div></div>"#;
        let jobs = parse_one_is(one_is);
        assert_eq!(jobs[0].company, "Araz Supermarket");
        assert_eq!(jobs[0].apply_link, "https://1is.az/vakansiya/77");
        assert_eq!(jobs[0].deadline, NaiveDate::from_ymd_opt(2025, 3, 12));

        let talhunt = r#"<div class="job-card"><h3 class="job-card__title">QA Engineer</h3><span class="job-card__company">PASHA Holding</span>
            <a class="job-card__link" href="/vacancies/qa-engineer">Bax</a><span class="job-card__type">Hibrid</span></div>"#;
        let jobs = parse_talhunt(talhunt);
        assert_eq!(jobs[0].apply_link, "https://talhunt.az/vacancies/qa-engineer");
        assert_eq!(jobs[0].schedule.as_deref(), Some("Hibrid"));
        assert_eq!(jobs[0].location, None);
    }

    #[test]
    fn test_parse_isqure_and_hrcbaku() {
        let isqure = r#"<a class="vacancy" href="/vakansiya/12"><span class="vacancy__title">Ofis meneceri</span>
            <span class="vacancy__company">Caspian Agro</span><span class="vacancy__city">Bakı</span></a>"#;
        let jobs = parse_isqure(isqure);
        assert_eq!(jobs[0].apply_link, "https://isqure.az/vakansiya/12");
        assert_eq!(jobs[0].company, "Caspian Agro");

        let hrc = r#"<div class="t-rec"><div class="job-item"><div class="tn-atom">Finance Manager</div>
            <a href="https://hrcbaku.com/finance-manager">Apply</a><span class="job-location">Baku</span></div></div>"#;
        let jobs = parse_hrcbaku(hrc);
        assert_eq!(jobs[0].company, "HRC Baku");
        assert_eq!(jobs[0].vacancy, "Finance Manager");
        assert_eq!(jobs[0].location.as_deref(), Some("Baku"));
    }

    #[tokio::test]
    async fn test_iilkin_follows_pages() {
        let page = |title: &str, next: Option<&str>| {
            let next = next.map(|n| format!(r#"<a class="next page-numbers" href="{n}">»</a>"#)).unwrap_or_default();
            format!(
                r#"<article class="job"><h2 class="entry-title"><a href="/vakansiya/{title}/">{title}</a></h2>
                <span class="job-company">Azəriqaz</span><span class="job-date">01.02.2025</span></article>{next}"#
            )
        };
        let fetcher = StubFetcher::new()
            .with_text(IILKIN_START, &page("operator", Some("page/2/")))
            .with_text("http://is-elanlari.iilkin.com/vakansiyalar/page/2/", &page("texnik", None));
        let (_, ctx) = test_context(fetcher);

        let jobs = Iilkin.parse(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].apply_link, "http://is-elanlari.iilkin.com/vakansiya/texnik/");
        assert!(jobs.iter().all(|j| j.deadline == NaiveDate::from_ymd_opt(2025, 2, 1)));
    }

    #[test]
    fn test_parse_unjobs_names_agency() {
        let html = r#"<div class="job"><a class="jtitle" href="/vacancies/1700000001">National Consultant</a><br><span>UNDP</span></div>
            <div class="job"><span>No link</span></div>"#;
        let jobs = parse_unjobs(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "UNDP");
        assert_eq!(jobs[0].apply_link, "https://unjobs.org/vacancies/1700000001");
    }
}
