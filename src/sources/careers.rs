//! Plain employer career pages: one page, one fixed company, a list of vacancy
//! blocks. Each page is described by its selectors instead of its own type.

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use scraper::Html;

use super::extract::{normalize_link, own_attr, parse_deadline, sel, select_attr, select_text, text_of};
use super::{ScrapeContext, SourceParser};
use crate::fetch::FetchRequest;
use crate::models::JobRecord;

#[derive(Debug, Clone, Copy)]
pub struct CareerPage {
    pub name: &'static str,
    pub company: &'static str,
    pub url: &'static str,
    /// One block per vacancy.
    pub item: &'static str,
    /// Falls back to the block's own text when absent.
    pub title: Option<&'static str>,
    /// `None` when the block itself is the anchor.
    pub link: Option<&'static str>,
    pub location: Option<&'static str>,
    pub deadline: Option<&'static str>,
    pub verify_tls: bool,
}

impl CareerPage {
    const BASE: CareerPage = CareerPage {
        name: "",
        company: "",
        url: "",
        item: "",
        title: None,
        link: None,
        location: None,
        deadline: None,
        verify_tls: true,
    };

    fn extract(&self, html: &str) -> Vec<JobRecord> {
        let doc = Html::parse_document(html);
        let title = self.title.map(sel);
        let link = self.link.map(sel);
        let location = self.location.map(sel);
        let deadline = self.deadline.map(sel);

        doc.select(&sel(self.item))
            .map(|item| {
                let vacancy = match &title {
                    Some(title) => select_text(item, title).unwrap_or_default(),
                    None => text_of(item),
                };
                let href = match &link {
                    Some(link) => select_attr(item, link, "href"),
                    None => own_attr(item, "href"),
                };
                JobRecord::new(self.company, vacancy, normalize_link(self.url, &href.unwrap_or_default()))
                    .with_location(location.as_ref().and_then(|s| select_text(item, s)))
                    .with_deadline(deadline.as_ref().and_then(|s| select_text(item, s)).and_then(|d| parse_deadline(&d)))
            })
            .collect()
    }

    #[cfg(test)]
    fn selectors(&self) -> impl Iterator<Item = &'static str> {
        [Some(self.item), self.title, self.link, self.location, self.deadline].into_iter().flatten()
    }
}

#[async_trait]
impl SourceParser for CareerPage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>> {
        let mut request = FetchRequest::get(self.url).browser_headers();
        if !self.verify_tls {
            request = request.insecure();
        }
        let body = ctx.fetcher().fetch(request).await?;
        let jobs = self.extract(&body.into_text());
        if jobs.is_empty() {
            warn!("{}: no vacancy blocks matched {:?}", self.name, self.item);
        }
        Ok(jobs)
    }
}

pub const BANK_OF_BAKU: CareerPage = CareerPage {
    name: "bank_of_baku",
    company: "Bank of Baku",
    url: "https://careers.bankofbaku.com/az/vacancies",
    item: ".main-cell",
    title: Some(".vacancy-title"),
    link: Some("a"),
    deadline: Some(".vacancy-date"),
    ..CareerPage::BASE
};

pub const AZERGOLD: CareerPage = CareerPage {
    name: "azergold",
    company: "AzerGold",
    url: "https://careers.azergold.az/",
    item: "table tbody tr",
    title: Some("td:nth-child(2)"),
    link: Some("a"),
    deadline: Some("td:nth-child(4)"),
    // Self-signed certificate.
    verify_tls: false,
    ..CareerPage::BASE
};

pub const KONSIS: CareerPage = CareerPage {
    name: "konsis",
    company: "Konsis",
    url: "https://konsis.az/karyera-vakansiya/",
    item: ".grid-item",
    title: Some(".cheading"),
    link: Some("a"),
    location: Some(".location"),
    ..CareerPage::BASE
};

pub const ASCO: CareerPage = CareerPage {
    name: "asco",
    company: "Azərbaycan Xəzər Dəniz Gəmiçiliyi",
    url: "https://asco.az/az/pages/6/65",
    item: "table.vacancy-table tbody tr",
    title: Some("td:nth-child(2)"),
    link: Some("a"),
    deadline: Some("td:nth-child(3)"),
    ..CareerPage::BASE
};

pub const ADA_UNIVERSITY: CareerPage = CareerPage {
    name: "ada_university",
    company: "ADA University",
    url: "https://ada.edu.az/jobs",
    item: "table.table-job tbody tr",
    title: Some("td.name a"),
    link: Some("td.name a"),
    deadline: Some("td.date"),
    ..CareerPage::BASE
};

pub const AZERICARD: CareerPage = CareerPage {
    name: "azericard",
    company: "AzeriCard",
    url: "https://www.azericard.com/az/career",
    item: "a.vacancy-item",
    title: Some(".vacancy-item__name"),
    location: Some(".vacancy-item__city"),
    ..CareerPage::BASE
};

pub const UNIBANK: CareerPage = CareerPage {
    name: "unibank",
    company: "Unibank",
    url: "https://unibank.az/az/career/vacancies",
    item: ".vacancies-list__item",
    title: Some(".vacancies-list__title"),
    link: Some("a"),
    deadline: Some(".vacancies-list__date"),
    ..CareerPage::BASE
};

pub const ZIRAAT_BANK: CareerPage = CareerPage {
    name: "ziraat_bank",
    company: "Ziraat Bank Azərbaycan",
    url: "https://ziraatbank.az/az/vacancies",
    item: ".vacancies a.vacancy",
    title: Some("h3"),
    deadline: Some(".date"),
    // Intermediate certificate is not served.
    verify_tls: false,
    ..CareerPage::BASE
};

pub const XALQ_BANK: CareerPage = CareerPage {
    name: "xalq_bank",
    company: "Xalq Bank",
    url: "https://www.xalqbank.az/az/ferdi/bank/career",
    item: ".career-list .career-item",
    title: Some(".career-item__title"),
    link: Some("a"),
    location: Some(".career-item__branch"),
    ..CareerPage::BASE
};

pub const AZERSUN: CareerPage = CareerPage {
    name: "azersun",
    company: "Azersun Holding",
    url: "https://www.azersun.com/az/karyera/vakansiyalar",
    item: ".vacancies .vacancy",
    title: Some(".vacancy__title"),
    link: Some("a"),
    location: Some(".vacancy__location"),
    deadline: Some(".vacancy__deadline"),
    ..CareerPage::BASE
};

pub const AZER_TURK_BANK: CareerPage = CareerPage {
    name: "azer_turk_bank",
    company: "Azər Türk Bank",
    url: "https://atb.az/az/career",
    item: ".vacancy-list li a",
    ..CareerPage::BASE
};

pub const YELO_BANK: CareerPage = CareerPage {
    name: "yelo_bank",
    company: "Yelo Bank",
    url: "https://www.yelo.az/az/career/",
    item: ".vacancy",
    title: Some(".vacancy__title"),
    link: Some("a.vacancy__link"),
    location: Some(".vacancy__city"),
    ..CareerPage::BASE
};

/// Every plain career page, in registry order.
pub const ALL: &[CareerPage] = &[
    BANK_OF_BAKU,
    AZERGOLD,
    KONSIS,
    ASCO,
    ADA_UNIVERSITY,
    AZERICARD,
    UNIBANK,
    ZIRAAT_BANK,
    XALQ_BANK,
    AZERSUN,
    AZER_TURK_BANK,
    YELO_BANK,
];
