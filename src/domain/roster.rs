use super::player::{PageKind, PlayerIdentity, Role, SlotKey};
use crate::error::{Result, TrackerError};
use serde::Serialize;

pub const MAX_ALLIES: usize = 4;
pub const MAX_ENEMIES: usize = 5;

/// Players configured for the upcoming match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    main: Option<PlayerIdentity>,
    allies: Vec<PlayerIdentity>,
    enemies: Vec<PlayerIdentity>,
}

pub type RosterSnapshot = Roster;

impl Roster {
    pub fn new(
        main: Option<PlayerIdentity>,
        allies: Vec<PlayerIdentity>,
        enemies: Vec<PlayerIdentity>,
    ) -> Result<Self> {
        let mut roster = Self {
            main,
            ..Self::default()
        };
        roster.set_allies(allies)?;
        roster.set_enemies(enemies)?;
        Ok(roster)
    }

    pub fn main(&self) -> Option<&PlayerIdentity> {
        self.main.as_ref()
    }

    pub fn allies(&self) -> &[PlayerIdentity] {
        &self.allies
    }

    pub fn enemies(&self) -> &[PlayerIdentity] {
        &self.enemies
    }

    pub fn set_allies(&mut self, allies: Vec<PlayerIdentity>) -> Result<()> {
        if allies.len() > MAX_ALLIES {
            return Err(TrackerError::MalformedInput(format!(
                "at most {MAX_ALLIES} allies allowed, got {}",
                allies.len()
            )));
        }
        self.allies = allies;
        Ok(())
    }

    pub fn set_enemies(&mut self, enemies: Vec<PlayerIdentity>) -> Result<()> {
        if enemies.len() > MAX_ENEMIES {
            return Err(TrackerError::MalformedInput(format!(
                "at most {MAX_ENEMIES} enemies allowed, got {}",
                enemies.len()
            )));
        }
        self.enemies = enemies;
        Ok(())
    }

    /// Every configured player with its reassembly key, main first, then
    /// allies and enemies in slot order.
    pub fn players(&self) -> Vec<(SlotKey, &PlayerIdentity)> {
        let main = self
            .main
            .iter()
            .map(|identity| (SlotKey::new(Role::Main, 0), identity));
        let allies = self
            .allies
            .iter()
            .enumerate()
            .map(|(i, identity)| (SlotKey::new(Role::Ally, i + 1), identity));
        let enemies = self
            .enemies
            .iter()
            .enumerate()
            .map(|(i, identity)| (SlotKey::new(Role::Enemy, i + 1), identity));

        main.chain(allies).chain(enemies).collect()
    }

    pub fn player_count(&self) -> usize {
        usize::from(self.main.is_some()) + self.allies.len() + self.enemies.len()
    }

    pub fn player_at(&self, key: SlotKey) -> Option<&PlayerIdentity> {
        match key.role {
            Role::Main if key.slot == 0 => self.main.as_ref(),
            Role::Main => None,
            Role::Ally => key.slot.checked_sub(1).and_then(|i| self.allies.get(i)),
            Role::Enemy => key.slot.checked_sub(1).and_then(|i| self.enemies.get(i)),
        }
    }

    pub fn tasks(&self) -> Vec<ScrapeTask> {
        self.players()
            .into_iter()
            .flat_map(|(key, identity)| {
                [PageKind::Overview, PageKind::Operators]
                    .into_iter()
                    .map(move |page| ScrapeTask {
                        identity: identity.clone(),
                        role: key.role,
                        slot: key.slot,
                        page,
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTask {
    pub identity: PlayerIdentity,
    pub role: Role,
    pub slot: usize,
    pub page: PageKind,
}

impl ScrapeTask {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.role, self.slot)
    }
}
