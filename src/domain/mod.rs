mod player;
mod roster;
mod stats;

pub use player::{PageKind, Platform, PlayerIdentity, ProfileUrl, Role, SlotKey};
pub use roster::{Roster, RosterSnapshot, ScrapeTask, MAX_ALLIES, MAX_ENEMIES};
pub use stats::{
    BatchReport, ErrorKind, MatchRecord, OperatorRecord, OverviewResult, OverviewStats,
    PlayerSnapshot, StatRecord, TaskError, SENTINEL,
};
