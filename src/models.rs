use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TEXT_LEN: usize = 500;
pub const MAX_LINK_LEN: usize = 1000;

/// One job posting as scraped from a source, before persistence.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct JobRecord {
    pub company: String,
    #[serde(alias = "title")]
    pub vacancy: String,
    pub apply_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsibilities: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_date: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(company: impl Into<String>, vacancy: impl Into<String>, apply_link: impl Into<String>) -> Self {
        Self {
            company: company.into().trim().to_string(),
            vacancy: vacancy.into().trim().to_string(),
            apply_link: apply_link.into().trim().to_string(),
            ..Default::default()
        }
    }

    /// Records without a company or a title cannot be stored.
    pub fn is_usable(&self) -> bool {
        !self.company.trim().is_empty() && !self.vacancy.trim().is_empty()
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = present(location);
        self
    }

    pub fn with_function(mut self, function: Option<String>) -> Self {
        self.function = present(function);
        self
    }

    pub fn with_schedule(mut self, schedule: Option<String>) -> Self {
        self.schedule = present(schedule);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<NaiveDate>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_responsibilities(mut self, text: Option<String>) -> Self {
        self.responsibilities = present(text);
        self
    }

    pub fn with_requirements(mut self, text: Option<String>) -> Self {
        self.requirements = present(text);
        self
    }

    pub fn with_description(mut self, text: Option<String>) -> Self {
        self.description = present(text);
        self
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// All records from one run, stamped with the run time.
#[derive(Debug, Serialize, Clone)]
pub struct ScrapeBatch {
    pub scrape_date: DateTime<Utc>,
    pub records: Vec<JobRecord>,
}

impl ScrapeBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Case-sensitive `(company, title)` pair, compared exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub company: String,
    pub title: String,
}

impl DedupKey {
    pub fn new(company: impl Into<String>, title: impl Into<String>) -> Self {
        Self { company: company.into(), title: title.into() }
    }
}

/// A row for the destination job table with the fixed scraper defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobPost {
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub function: Option<String>,
    pub schedule: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub responsibilities: Option<String>,
    pub requirements: Option<String>,
    pub posted_by_id: i64,
    pub is_scraped: bool,
    pub is_premium: bool,
    pub premium_days: i32,
    pub priority_level: i32,
    pub posted_at: DateTime<Utc>,
    pub deleted: bool,
    pub apply_link: String,
}

impl NewJobPost {
    pub fn from_record(record: &JobRecord, posted_by_id: i64, posted_at: DateTime<Utc>) -> Self {
        Self {
            title: truncate_chars(record.vacancy.trim(), MAX_TEXT_LEN),
            description: record.description.clone().unwrap_or_default(),
            company: truncate_chars(record.company.trim(), MAX_TEXT_LEN),
            location: record.location.as_deref().map(|l| truncate_chars(l, MAX_TEXT_LEN)).unwrap_or_default(),
            function: record.function.as_deref().map(|f| truncate_chars(f, MAX_TEXT_LEN)),
            schedule: record.schedule.as_deref().map(|s| truncate_chars(s, MAX_TEXT_LEN)),
            deadline: record.deadline,
            responsibilities: record.responsibilities.clone(),
            requirements: record.requirements.clone(),
            posted_by_id,
            is_scraped: true,
            is_premium: false,
            premium_days: 0,
            priority_level: 99,
            posted_at,
            deleted: false,
            apply_link: truncate_chars(&record.apply_link, MAX_LINK_LEN),
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.company.clone(), self.title.clone())
    }
}

pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

// --- Specialized Response Structs ---

#[derive(Deserialize)]
pub struct JobSearchPage {
    #[serde(default)]
    pub items: Vec<JobSearchItem>,
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct JobSearchItem {
    pub title: String,
    pub slug: String,
    pub company: Option<JobSearchCompany>,
    pub category: Option<JobSearchCategory>,
    pub deadline_at: Option<String>,
}

#[derive(Deserialize)]
pub struct JobSearchCompany {
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct JobSearchCategory {
    pub title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlorriPage {
    #[serde(default)]
    pub entities: Vec<GlorriJob>,
    pub total_count: Option<usize>,
}

#[derive(Deserialize)]
pub struct GlorriJob {
    pub title: String,
    pub slug: String,
    pub company: GlorriCompany,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    #[serde(rename = "jobFunction")]
    pub job_function: Option<String>,
}

#[derive(Deserialize)]
pub struct GlorriCompany {
    pub name: String,
    pub slug: String,
}

#[derive(Deserialize)]
pub struct KapitalVacancies {
    #[serde(default)]
    pub data: Vec<KapitalVacancy>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KapitalVacancy {
    pub id: i64,
    pub header: String,
    pub end_date: Option<String>,
    pub city: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize)]
pub struct CareerHubResponse {
    pub data: Option<CareerHubData>,
}

#[derive(Deserialize)]
pub struct CareerHubData {
    pub vacancies: CareerHubVacancies,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerHubVacancies {
    #[serde(default)]
    pub data: Vec<CareerHubVacancy>,
    #[serde(default)]
    pub has_more_pages: bool,
}

#[derive(Deserialize)]
pub struct CareerHubVacancy {
    pub title: String,
    pub slug: String,
    pub company: Option<CareerHubCompany>,
    pub city: Option<String>,
    pub deadline: Option<String>,
    pub employment: Option<String>,
}

#[derive(Deserialize)]
pub struct CareerHubCompany {
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrinPage {
    #[serde(default)]
    pub results: Vec<HrinVacancy>,
    pub count: Option<usize>,
}

#[derive(Deserialize)]
pub struct HrinVacancy {
    pub id: i64,
    pub title: String,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub work_type: Option<String>,
    pub category: Option<String>,
    pub deadline: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct AzalVacancies {
    #[serde(default)]
    pub data: Vec<AzalVacancy>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzalVacancy {
    pub id: i64,
    pub title: String,
    pub department: Option<String>,
    pub city: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct BakuElectronicsPage {
    #[serde(default)]
    pub items: Vec<BakuElectronicsVacancy>,
}

#[derive(Deserialize)]
pub struct BakuElectronicsVacancy {
    pub slug: String,
    pub name: String,
    pub city: Option<String>,
    pub category: Option<String>,
    pub deadline: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct ProJobsPage {
    #[serde(default)]
    pub data: Vec<ProJobsVacancy>,
    pub meta: Option<ProJobsMeta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProJobsMeta {
    pub last_page: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProJobsVacancy {
    pub id: i64,
    pub name: String,
    pub company_name: Option<String>,
    pub city_name: Option<String>,
    pub job_type_name: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Deserialize)]
pub struct StaffyResponse {
    pub data: Option<StaffyData>,
}

#[derive(Deserialize)]
pub struct StaffyData {
    pub jobs: StaffyJobs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffyJobs {
    #[serde(default)]
    pub edges: Vec<StaffyEdge>,
    pub page_info: StaffyPageInfo,
}

#[derive(Deserialize)]
pub struct StaffyEdge {
    pub node: StaffyJob,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffyJob {
    pub id: String,
    pub title: String,
    pub company: Option<StaffyCompany>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Deserialize)]
pub struct StaffyCompany {
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffyPageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}
