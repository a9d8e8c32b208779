use crate::domain::{
    BatchReport, OperatorRecord, OverviewResult, PageKind, PlayerIdentity, PlayerSnapshot, Role,
    RosterSnapshot, SlotKey, TaskError,
};
use crate::services::roster::RosterStore;
use crate::services::scraping::{BatchScraper, TaskOutput};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

/// The operations the dashboard calls. Full batches use the scraper's own
/// pool; single-player lookups share one smaller pool across all callers.
pub struct TrackerService {
    scraper: BatchScraper,
    single_permits: Arc<Semaphore>,
    roster: RosterStore,
}

impl TrackerService {
    pub fn new(scraper: BatchScraper, single_workers: usize, roster: RosterStore) -> Self {
        info!(
            "Created tracker service, single-player pool of {}",
            single_workers
        );
        Self {
            scraper,
            single_permits: Arc::new(Semaphore::new(single_workers.max(1))),
            roster,
        }
    }

    pub fn roster(&self) -> &RosterStore {
        &self.roster
    }

    pub fn scraper(&self) -> &BatchScraper {
        &self.scraper
    }

    pub async fn fetch_batch(&self, roster: RosterSnapshot) -> BatchReport {
        self.scraper.run(roster).await
    }

    /// Batch over a snapshot of the live roster.
    pub async fn fetch_configured(&self) -> BatchReport {
        let snapshot = self.roster.snapshot().await;
        self.fetch_batch(snapshot).await
    }

    pub async fn fetch_single(
        &self,
        identity: PlayerIdentity,
        role: Role,
        slot: usize,
    ) -> PlayerSnapshot {
        let key = SlotKey::new(role, slot);
        info!("Single fetch for {} as {}", identity, key);
        self.scraper
            .run_player(identity, key, Arc::clone(&self.single_permits))
            .await
    }

    pub async fn fetch_overview_only(&self, identity: PlayerIdentity) -> OverviewResult {
        match self
            .scraper
            .run_page(identity, PageKind::Overview, Arc::clone(&self.single_permits))
            .await
        {
            TaskOutput::Overview(result) => result,
            TaskOutput::Operators(_) => TaskError::internal("unexpected operators result").into(),
        }
    }

    pub async fn fetch_operators_only(&self, identity: PlayerIdentity) -> Vec<OperatorRecord> {
        match self
            .scraper
            .run_page(identity, PageKind::Operators, Arc::clone(&self.single_permits))
            .await
        {
            TaskOutput::Operators(operators) => operators,
            TaskOutput::Overview(_) => Vec::new(),
        }
    }
}
