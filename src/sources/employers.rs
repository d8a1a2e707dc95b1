//! Career pages of individual employers. The company name is fixed per source.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use scraper::Html;

use super::extract::{
    clean_html, normalize_link, own_attr, parse_deadline, section_after_heading, sel, select_attr, select_text, text_of,
};
use super::paginate::enrich_details;
use super::{ScrapeContext, SourceParser};
use crate::fetch::{Fetch, FetchRequest};
use crate::models::{AzalVacancies, BakuElectronicsPage, JobRecord, KapitalVacancies};

const RESPONSIBILITY_LABELS: &[&str] = &["öhdəlik", "vəzifə", "responsibilit", "обязанност"];
const REQUIREMENT_LABELS: &[&str] = &["tələb", "requirement", "требован"];

// --- Azercell ---

pub struct Azercell;

const AZERCELL_URL: &str = "https://www.azercell.com/az/about-us/career.html";
/// Existing rows carry this spelling and dedup keys are case-sensitive.
const AZERCELL_COMPANY: &str = "azercell";

#[async_trait]
impl SourceParser for Azercell {
    fn name(&self) -> &'static str {
        "azercell"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(AZERCELL_URL).browser_headers()).await?;
        Ok(parse_azercell(&body.into_text()))
    }
}

fn parse_azercell(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let Some(section) = doc.select(&sel("section.section_vacancies")).next() else {
        warn!("Vacancies section not found on the Azercell page");
        return vec![];
    };

    let title = sel("h4.vacancies__name");
    let location = sel(".vacancies__location");
    section
        .select(&sel("a.vacancies__link"))
        .map(|link| {
            let href = own_attr(link, "href").unwrap_or_default();
            JobRecord::new(AZERCELL_COMPANY, select_text(link, &title).unwrap_or_default(), normalize_link(AZERCELL_URL, &href))
                .with_location(select_text(link, &location))
        })
        .collect()
}

// --- Bakcell ---

pub struct Bakcell;

const BAKCELL_URL: &str = "https://www.bakcell.com/az/karyera/vakansiyalar";

#[async_trait]
impl SourceParser for Bakcell {
    fn name(&self) -> &'static str {
        "bakcell"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(BAKCELL_URL).browser_headers()).await?;
        Ok(parse_bakcell(&body.into_text()))
    }
}

fn parse_bakcell(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, link, location, date) = (
        sel(".vacancy-item__title"),
        sel("a"),
        sel(".vacancy-item__location"),
        sel(".vacancy-item__date"),
    );

    doc.select(&sel(".vacancy-item"))
        .map(|item| {
            let href = select_attr(item, &link, "href").unwrap_or_default();
            JobRecord::new("Bakcell", select_text(item, &title).unwrap_or_default(), normalize_link(BAKCELL_URL, &href))
                .with_location(select_text(item, &location))
                .with_deadline(select_text(item, &date).and_then(|d| parse_deadline(&d)))
        })
        .collect()
}

// --- Kapital Bank ---

pub struct KapitalBank;

const KAPITAL_API: &str = "https://apihr.kapitalbank.az/api/Vacancy/vacancies";

#[async_trait]
impl SourceParser for KapitalBank {
    fn name(&self) -> &'static str {
        "kapital_bank"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let request = FetchRequest::get(KAPITAL_API)
            .query("Skip", "0")
            .query("Take", "150")
            .query("SortField", "id")
            .query("OrderBy", "true")
            .header("Accept", "application/json");
        let body = ctx.fetcher().fetch(request).await?;
        let value = body.into_json().context("Kapital Bank did not return JSON")?;
        let vacancies: KapitalVacancies = serde_json::from_value(value).context("Unexpected Kapital Bank payload")?;

        Ok(vacancies
            .data
            .into_iter()
            .map(|v| {
                JobRecord::new("Kapital Bank", v.header, format!("https://hr.kapitalbank.az/vacancy/{}", v.id))
                    .with_location(v.city)
                    .with_function(v.department)
                    .with_deadline(v.end_date.as_deref().and_then(parse_deadline))
            })
            .collect())
    }
}

// --- PASHA Bank ---

pub struct PashaBank;

const PASHA_URL: &str = "https://careers.pashabank.az/az/page/vacancies";

#[async_trait]
impl SourceParser for PashaBank {
    fn name(&self) -> &'static str {
        "pasha_bank"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(PASHA_URL).browser_headers()).await?;
        let listings = parse_pasha_listing(&body.into_text());
        debug!("PASHA Bank: {} listings, fetching details", listings.len());

        let fetcher = ctx.fetcher();
        Ok(enrich_details(listings, ctx.concurrency, |record| fetch_pasha_detail(fetcher, record)).await)
    }
}

fn parse_pasha_listing(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (link, location) = (sel("h3 a"), sel(".vacancy-location"));

    doc.select(&sel("div.vacancy"))
        .filter_map(|item| {
            let anchor = item.select(&link).next()?;
            let href = own_attr(anchor, "href").unwrap_or_default();
            let title = text_of(anchor);
            Some(
                JobRecord::new("PASHA Bank", title, normalize_link(PASHA_URL, &href))
                    .with_location(select_text(item, &location)),
            )
        })
        .collect()
}

async fn fetch_pasha_detail(fetcher: &dyn Fetch, record: JobRecord) -> JobRecord {
    if record.apply_link.is_empty() {
        return record;
    }
    match fetcher.fetch(FetchRequest::get(record.apply_link.as_str()).browser_headers().retries(1)).await {
        Ok(body) => apply_pasha_detail(record, &body.into_text()),
        Err(e) => {
            debug!("PASHA Bank detail unavailable for {}: {}", record.apply_link, e);
            record
        }
    }
}

fn apply_pasha_detail(record: JobRecord, html: &str) -> JobRecord {
    let doc = Html::parse_document(html);
    let heading = sel("h4, h3, strong");
    let deadline = doc
        .select(&sel(".vacancy-deadline"))
        .next()
        .and_then(|d| parse_deadline(&text_of(d)));

    record
        .with_deadline(deadline)
        .with_responsibilities(section_after_heading(&doc, &heading, RESPONSIBILITY_LABELS))
        .with_requirements(section_after_heading(&doc, &heading, REQUIREMENT_LABELS))
}

// --- Azerbaijan Railways ---

pub struct AzerbaijanRailways;

const ADY_URL: &str = "https://ady.az/az/vacancies";

#[async_trait]
impl SourceParser for AzerbaijanRailways {
    fn name(&self) -> &'static str {
        "ady"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        // Certificate chain is incomplete on this host.
        let body = ctx.fetcher().fetch(FetchRequest::get(ADY_URL).browser_headers().insecure()).await?;
        Ok(parse_ady(&body.into_text()))
    }
}

fn parse_ady(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, deadline, link) = (sel("td:nth-child(1)"), sel("td:nth-child(2)"), sel("a"));

    doc.select(&sel("table.vacancies tbody tr"))
        .map(|row| {
            let href = select_attr(row, &link, "href").unwrap_or_default();
            JobRecord::new("Azərbaycan Dəmir Yolları", select_text(row, &title).unwrap_or_default(), normalize_link(ADY_URL, &href))
                .with_deadline(select_text(row, &deadline).and_then(|d| parse_deadline(&d)))
        })
        .collect()
}

// --- Bank Respublika ---

pub struct BankRespublika;

const RESPUBLIKA_URL: &str = "https://www.bankrespublika.az/az/career";

#[async_trait]
impl SourceParser for BankRespublika {
    fn name(&self) -> &'static str {
        "bank_respublika"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(RESPUBLIKA_URL).browser_headers()).await?;
        Ok(parse_respublika(&body.into_text()))
    }
}

fn parse_respublika(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let branch = sel(".branch");

    doc.select(&sel(".vacancy-list li a"))
        .map(|anchor| {
            let href = own_attr(anchor, "href").unwrap_or_default();
            let title = anchor
                .select(&sel(".title"))
                .next()
                .map(text_of)
                .unwrap_or_else(|| text_of(anchor));
            JobRecord::new("Bank Respublika", title, normalize_link(RESPUBLIKA_URL, &href))
                .with_location(select_text(anchor, &branch))
        })
        .collect()
}

// --- Azerconnect ---

pub struct Azerconnect;

const AZERCONNECT_URL: &str = "https://azerconnect.az/az/careers";

#[async_trait]
impl SourceParser for Azerconnect {
    fn name(&self) -> &'static str {
        "azerconnect"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(AZERCONNECT_URL).browser_headers()).await?;
        let listings = parse_azerconnect(&body.into_text());

        let fetcher = ctx.fetcher();
        Ok(enrich_details(listings, ctx.concurrency, move |record| async move {
            match fetcher.fetch(FetchRequest::get(record.apply_link.as_str()).browser_headers().retries(1)).await {
                Ok(body) => {
                    let description = azerconnect_description(&body.into_text());
                    record.with_description(description)
                }
                Err(e) => {
                    debug!("Azerconnect detail unavailable for {}: {}", record.apply_link, e);
                    record
                }
            }
        })
        .await)
    }
}

fn parse_azerconnect(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, link, department) = (sel(".career-card__title"), sel("a.career-card__link"), sel(".career-card__department"));

    doc.select(&sel(".career-card"))
        .map(|card| {
            let href = select_attr(card, &link, "href").unwrap_or_default();
            JobRecord::new("Azerconnect", select_text(card, &title).unwrap_or_default(), normalize_link(AZERCONNECT_URL, &href))
                .with_function(select_text(card, &department))
        })
        .collect()
}

fn azerconnect_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&sel(".vacancy-description"))
        .next()
        .map(|d| clean_html(&d.inner_html()))
        .filter(|d| !d.is_empty())
}

// --- ABB ---

pub struct AbbBank;

const ABB_URL: &str = "https://abb-bank.az/az/karyera/vakansiyalar";

#[async_trait]
impl SourceParser for AbbBank {
    fn name(&self) -> &'static str {
        "abb_bank"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(ABB_URL).browser_headers()).await?;
        Ok(parse_abb(&body.into_text()))
    }
}

fn parse_abb(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, date, link, category) = (
        sel(".vacancy-card__title"),
        sel(".vacancy-card__date"),
        sel("a"),
        sel(".vacancy-card__category"),
    );

    doc.select(&sel(".vacancy-card"))
        .map(|card| {
            let href = select_attr(card, &link, "href").unwrap_or_default();
            JobRecord::new("ABB", select_text(card, &title).unwrap_or_default(), normalize_link(ABB_URL, &href))
                .with_function(select_text(card, &category))
                .with_deadline(select_text(card, &date).and_then(|d| parse_deadline(&d)))
        })
        .collect()
}

// --- Central Bank of Azerbaijan ---

pub struct CentralBank;

const CBAR_URL: &str = "https://www.cbar.az/page-43/vacancies";

#[async_trait]
impl SourceParser for CentralBank {
    fn name(&self) -> &'static str {
        "cbar"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(CBAR_URL).browser_headers()).await?;
        Ok(parse_cbar(&body.into_text()))
    }
}

fn parse_cbar(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (link, deadline) = (sel("td:first-child a"), sel("td:nth-child(2)"));

    doc.select(&sel("table tr"))
        .filter_map(|row| {
            let anchor = row.select(&link).next()?;
            let href = own_attr(anchor, "href").unwrap_or_default();
            Some(
                JobRecord::new("Azərbaycan Respublikasının Mərkəzi Bankı", text_of(anchor), normalize_link(CBAR_URL, &href))
                    .with_deadline(select_text(row, &deadline).and_then(|d| parse_deadline(&d))),
            )
        })
        .collect()
}

// --- State Oil Fund ---

pub struct OilFund;

const OILFUND_URL: &str = "https://www.oilfund.az/az/opportunities/vacancies";

#[async_trait]
impl SourceParser for OilFund {
    fn name(&self) -> &'static str {
        "oilfund"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let body = ctx.fetcher().fetch(FetchRequest::get(OILFUND_URL).browser_headers()).await?;
        let listings = parse_oilfund(&body.into_text());
        debug!("Oil Fund: {} listings, fetching details", listings.len());

        let fetcher = ctx.fetcher();
        Ok(enrich_details(listings, ctx.concurrency, move |record| async move {
            match fetcher.fetch(FetchRequest::get(record.apply_link.as_str()).browser_headers().retries(1)).await {
                Ok(body) => apply_oilfund_detail(record, &body.into_text()),
                Err(e) => {
                    debug!("Oil Fund detail unavailable for {}: {}", record.apply_link, e);
                    record
                }
            }
        })
        .await)
    }
}

fn parse_oilfund(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let title = sel(".vacancy-item__title");

    doc.select(&sel("a.vacancy-item"))
        .map(|item| {
            let href = own_attr(item, "href").unwrap_or_default();
            let title = select_text(item, &title).unwrap_or_else(|| text_of(item));
            JobRecord::new("Azərbaycan Respublikasının Dövlət Neft Fondu", title, normalize_link(OILFUND_URL, &href))
        })
        .collect()
}

fn apply_oilfund_detail(record: JobRecord, html: &str) -> JobRecord {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    let heading = sel("h3, h4, strong");
    let deadline = select_text(root, &sel(".vacancy-deadline")).and_then(|d| parse_deadline(&d));
    let description = root
        .select(&sel(".vacancy-content"))
        .next()
        .map(|c| clean_html(&c.inner_html()))
        .filter(|d| !d.is_empty());

    record
        .with_deadline(deadline)
        .with_description(description)
        .with_responsibilities(section_after_heading(&doc, &heading, RESPONSIBILITY_LABELS))
        .with_requirements(section_after_heading(&doc, &heading, REQUIREMENT_LABELS))
}

// --- Azerbaijan Airlines ---

pub struct Azal;

const AZAL_API: &str = "https://www.azal.az/api/career/vacancies";

#[async_trait]
impl SourceParser for Azal {
    fn name(&self) -> &'static str {
        "azal"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let request = FetchRequest::get(AZAL_API).query("lang", "az").header("Accept", "application/json");
        let body = ctx.fetcher().fetch(request).await?;
        let value = body.into_json().context("AZAL did not return JSON")?;
        let vacancies: AzalVacancies = serde_json::from_value(value).context("Unexpected AZAL payload")?;

        Ok(vacancies
            .data
            .into_iter()
            .map(|v| {
                JobRecord::new("Azerbaijan Airlines", v.title, format!("https://www.azal.az/az/career/vacancies/{}", v.id))
                    .with_function(v.department)
                    .with_location(v.city)
                    .with_deadline(v.end_date.as_deref().and_then(parse_deadline))
            })
            .collect())
    }
}

// --- Baku Electronics ---

pub struct BakuElectronics;

const BAKU_ELECTRONICS_API: &str = "https://www.bakuelectronics.az/api/vacancies";

#[async_trait]
impl SourceParser for BakuElectronics {
    fn name(&self) -> &'static str {
        "baku_electronics"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let request = FetchRequest::get(BAKU_ELECTRONICS_API).header("Accept", "application/json");
        let body = ctx.fetcher().fetch(request).await?;
        let value = body.into_json().context("Baku Electronics did not return JSON")?;
        let page: BakuElectronicsPage = serde_json::from_value(value).context("Unexpected Baku Electronics payload")?;

        Ok(page
            .items
            .into_iter()
            .map(|v| {
                JobRecord::new("Baku Electronics", v.name, format!("https://www.bakuelectronics.az/vakansiyalar/{}", v.slug))
                    .with_location(v.city)
                    .with_function(v.category)
                    .with_deadline(v.deadline.as_deref().and_then(parse_deadline))
                    .with_description(v.description.as_deref().map(clean_html).filter(|d| !d.is_empty()))
            })
            .collect())
    }
}

// --- TƏBİB ---

pub struct Tabib;

const TABIB_URL: &str = "https://tabib.gov.az/vetendashlar-ucun/vakansiyalar";

#[async_trait]
impl SourceParser for Tabib {
    fn name(&self) -> &'static str {
        "tabib"
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        // Certificate does not match the host name.
        let body = ctx.fetcher().fetch(FetchRequest::get(TABIB_URL).browser_headers().insecure()).await?;
        Ok(parse_tabib(&body.into_text()))
    }
}

fn parse_tabib(html: &str) -> Vec<JobRecord> {
    let doc = Html::parse_document(html);
    let (title, link, clinic, deadline) = (sel(".vacancy-card__title"), sel("a"), sel(".vacancy-card__clinic"), sel(".vacancy-card__date"));

    doc.select(&sel(".vacancy-card"))
        .map(|card| {
            let href = select_attr(card, &link, "href").unwrap_or_default();
            JobRecord::new("TƏBİB", select_text(card, &title).unwrap_or_default(), normalize_link(TABIB_URL, &href))
                .with_location(select_text(card, &clinic))
                .with_deadline(select_text(card, &deadline).and_then(|d| parse_deadline(&d)))
        })
        .collect()
}
