//! Source parsers: one per upstream site, all behind [`SourceParser`].

pub mod apis;
pub mod boards;
pub mod careers;
pub mod employers;
pub mod extract;
pub mod paginate;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::RunSettings;
use crate::fetch::Fetch;
use crate::models::JobRecord;

pub use paginate::Pagination;

/// Everything a parser may use during a run. Built once in `main`.
pub struct ScrapeContext {
    pub fetcher: Arc<dyn Fetch>,
    /// Cap for concurrent page and detail fetches inside one source.
    pub concurrency: usize,
}

impl ScrapeContext {
    pub fn new(fetcher: Arc<dyn Fetch>, run: &RunSettings) -> Self {
        Self { fetcher, concurrency: run.detail_concurrency }
    }

    pub fn fetcher(&self) -> &dyn Fetch {
        self.fetcher.as_ref()
    }
}

#[async_trait]
pub trait SourceParser: Send + Sync {
    /// Stable identifier used in logs and `--only`.
    fn name(&self) -> &'static str;

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    /// Scrapes every listing of this source. An `Err` means nothing usable came back.
    async fn parse(&self, ctx: &ScrapeContext) -> Result<Vec<JobRecord>>;
}

/// All sources scraped by a regular run.
pub fn registry() -> Vec<Arc<dyn SourceParser>> {
    let mut sources: Vec<Arc<dyn SourceParser>> = vec![
        Arc::new(employers::Azercell),
        Arc::new(employers::Bakcell),
        Arc::new(employers::KapitalBank),
        Arc::new(employers::PashaBank),
        Arc::new(employers::AzerbaijanRailways),
        Arc::new(employers::BankRespublika),
        Arc::new(employers::Azerconnect),
        Arc::new(employers::AbbBank),
        Arc::new(employers::CentralBank),
        Arc::new(employers::OilFund),
        Arc::new(employers::Azal),
        Arc::new(employers::BakuElectronics),
        Arc::new(employers::Tabib),
        Arc::new(boards::BossAz),
        Arc::new(boards::HelloJob),
        Arc::new(boards::SmartJob),
        Arc::new(boards::JobBox),
        Arc::new(boards::PositionAz),
        Arc::new(boards::VakansiyaAz),
        Arc::new(boards::BankerAz),
        Arc::new(boards::OfferAz),
        Arc::new(boards::BusyAz),
        Arc::new(boards::EjobAz),
        Arc::new(boards::IsverenAz),
        Arc::new(boards::IsElanlariAz),
        Arc::new(boards::VakansiyaBiz),
        Arc::new(boards::Hh1Az),
        Arc::new(boards::OneIsAz),
        Arc::new(boards::TalhuntAz),
        Arc::new(boards::IsQure),
        Arc::new(boards::HrcBaku),
        Arc::new(boards::Iilkin),
        Arc::new(boards::UnJobs),
        Arc::new(apis::JobSearchAz),
        Arc::new(apis::Glorri),
        Arc::new(apis::CareerHub),
        Arc::new(apis::Hrin),
        Arc::new(apis::ProJobs),
        Arc::new(apis::Staffy),
    ];
    sources.extend(careers::ALL.iter().map(|page| Arc::new(*page) as Arc<dyn SourceParser>));
    sources
}

#[cfg(test)]
pub(crate) fn test_context(fetcher: crate::fetch::testing::StubFetcher) -> (Arc<crate::fetch::testing::StubFetcher>, ScrapeContext) {
    let stub = Arc::new(fetcher);
    let ctx = ScrapeContext { fetcher: stub.clone(), concurrency: 4 };
    (stub, ctx)
}
