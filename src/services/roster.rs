use crate::domain::{PlayerIdentity, Roster, RosterSnapshot};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The live roster, shared between the HTTP handlers and batch runs.
/// Batches work on a copy taken at start, so updates never race with them.
#[derive(Clone, Default)]
pub struct RosterStore {
    inner: Arc<RwLock<Roster>>,
}

impl RosterStore {
    pub fn new(roster: Roster) -> Self {
        Self {
            inner: Arc::new(RwLock::new(roster)),
        }
    }

    pub async fn snapshot(&self) -> RosterSnapshot {
        self.inner.read().await.clone()
    }

    /// Replaces allies and enemies. Nothing changes if either list is over
    /// its cap.
    pub async fn update(
        &self,
        allies: Vec<PlayerIdentity>,
        enemies: Vec<PlayerIdentity>,
    ) -> Result<RosterSnapshot> {
        let mut roster = self.inner.write().await;
        let mut updated = roster.clone();
        updated.set_allies(allies)?;
        updated.set_enemies(enemies)?;
        *roster = updated;

        info!(
            "Roster updated: {} allies, {} enemies",
            roster.allies().len(),
            roster.enemies().len()
        );
        Ok(roster.clone())
    }
}
