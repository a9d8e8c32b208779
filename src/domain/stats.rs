use super::player::{PageKind, PlayerIdentity, ProfileUrl, Role, SlotKey};
use crate::error::NavigationError;
use chrono::Utc;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Value recorded for a stat that was searched for and not found.
pub const SENTINEL: &str = "N/A";

/// Ordered label -> value mapping. Values are never empty: blank input is
/// stored as [`SENTINEL`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatRecord {
    entries: Vec<(String, String)>,
}

impl StatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = non_empty(value.into());
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn insert_unavailable(&mut self, label: impl Into<String>) {
        self.insert(label, SENTINEL);
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }
}

impl Serialize for StatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

pub(crate) fn non_empty(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        SENTINEL.to_string()
    } else if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Image URL")]
    pub image_reference: String,
    #[serde(rename = "Rounds Played")]
    pub rounds_played: String,
    #[serde(rename = "Win %")]
    pub win_rate: String,
    #[serde(rename = "HS %")]
    pub headshot_rate: String,
    #[serde(rename = "K/D")]
    pub kd_ratio: String,
}

impl Default for OperatorRecord {
    fn default() -> Self {
        Self {
            name: SENTINEL.to_string(),
            image_reference: SENTINEL.to_string(),
            rounds_played: SENTINEL.to_string(),
            win_rate: SENTINEL.to_string(),
            headshot_rate: SENTINEL.to_string(),
            kd_ratio: SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    #[serde(rename = "Result")]
    pub result: String,
    #[serde(rename = "Map")]
    pub map: String,
    #[serde(rename = "Mode")]
    pub mode: String,
    #[serde(rename = "Score")]
    pub score: String,
    #[serde(rename = "K/D")]
    pub kd_ratio: String,
    #[serde(rename = "Kills")]
    pub kills: String,
    #[serde(rename = "Deaths")]
    pub deaths: String,
    #[serde(rename = "Assists")]
    pub assists: String,
    #[serde(rename = "HS%")]
    pub headshot_rate: String,
}

impl Default for MatchRecord {
    fn default() -> Self {
        Self {
            result: "Unknown".to_string(),
            map: SENTINEL.to_string(),
            mode: SENTINEL.to_string(),
            score: SENTINEL.to_string(),
            kd_ratio: SENTINEL.to_string(),
            kills: SENTINEL.to_string(),
            deaths: SENTINEL.to_string(),
            assists: SENTINEL.to_string(),
            headshot_rate: SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    Blocked,
    Timeout,
    MalformedInput,
    Browser,
    Internal,
}

/// Structured per-task failure surfaced to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub error: String,
    pub error_kind: ErrorKind,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            error_kind: kind,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<NavigationError> for TaskError {
    fn from(err: NavigationError) -> Self {
        let kind = match err {
            NavigationError::Timeout(_) => ErrorKind::Timeout,
            NavigationError::Blocked => ErrorKind::Blocked,
            NavigationError::Browser(_) => ErrorKind::Browser,
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverviewStats {
    #[serde(flatten)]
    pub fields: StatRecord,
    #[serde(rename = "Last Matches")]
    pub recent_matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OverviewResult {
    Stats(OverviewStats),
    Error(TaskError),
}

impl OverviewResult {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            OverviewResult::Stats(_) => None,
            OverviewResult::Error(err) => Some(err.error_kind),
        }
    }

    pub fn stats(&self) -> Option<&OverviewStats> {
        match self {
            OverviewResult::Stats(stats) => Some(stats),
            OverviewResult::Error(_) => None,
        }
    }
}

impl From<TaskError> for OverviewResult {
    fn from(err: TaskError) -> Self {
        OverviewResult::Error(err)
    }
}

/// Everything known about one player after a fetch. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub username: String,
    pub platform: String,
    pub player_type: Role,
    pub player_index: usize,
    pub tracker_url: ProfileUrl,
    pub overview: OverviewResult,
    #[serde(rename = "Top Operators")]
    pub operators: Vec<OperatorRecord>,
}

impl PlayerSnapshot {
    pub fn new(
        identity: &PlayerIdentity,
        key: SlotKey,
        overview: OverviewResult,
        operators: Vec<OperatorRecord>,
    ) -> Self {
        Self {
            username: identity.username().to_string(),
            platform: identity.platform().to_string(),
            player_type: key.role,
            player_index: key.slot,
            tracker_url: identity.profile_url(PageKind::Overview),
            overview,
            operators,
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.player_type, self.player_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub players: BTreeMap<SlotKey, PlayerSnapshot>,
    pub fetched_at: String,
}

impl BatchReport {
    pub fn new(players: BTreeMap<SlotKey, PlayerSnapshot>) -> Self {
        Self {
            players,
            fetched_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, key: SlotKey) -> Option<&PlayerSnapshot> {
        self.players.get(&key)
    }

    pub fn error_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.overview.error_kind().is_some())
            .count()
    }

    fn by_role(&self, role: Role) -> Vec<&PlayerSnapshot> {
        self.players
            .iter()
            .filter(|(key, _)| key.role == role)
            .map(|(_, snapshot)| snapshot)
            .collect()
    }
}

impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("main", &self.by_role(Role::Main).first())?;
        map.serialize_entry("allies", &self.by_role(Role::Ally))?;
        map.serialize_entry("enemies", &self.by_role(Role::Enemy))?;
        map.serialize_entry("fetched_at", &self.fetched_at)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::Platform;
    use serde_json::json;

    #[test]
    fn stat_record_never_stores_empty_values() {
        let mut record = StatRecord::new();
        record.insert("Level", "");
        record.insert("Time Played", "   ");
        record.insert("Matches", " 812 ");
        assert_eq!(record.get("Level"), Some(SENTINEL));
        assert_eq!(record.get("Time Played"), Some(SENTINEL));
        assert_eq!(record.get("Matches"), Some("812"));
    }

    #[test]
    fn stat_record_keeps_insertion_order_on_replace() {
        let mut record = StatRecord::new();
        record.insert("b", "1");
        record.insert("a", "2");
        record.insert("b", "3");
        let labels: Vec<_> = record.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"b":"3","a":"2"}"#
        );
    }

    #[test]
    fn overview_error_serializes_flat() {
        let result = OverviewResult::Error(TaskError::not_found("no such profile"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "error": "no such profile", "error_kind": "NotFound" })
        );
    }

    #[test]
    fn batch_report_serializes_by_role() {
        let alice = PlayerIdentity::new("Alice", Platform::Psn).unwrap();
        let bob = PlayerIdentity::new("Bob", Platform::Xbox).unwrap();
        let mut players = BTreeMap::new();
        let main = SlotKey::new(Role::Main, 0);
        let enemy = SlotKey::new(Role::Enemy, 1);
        players.insert(
            main,
            PlayerSnapshot::new(
                &alice,
                main,
                OverviewResult::Stats(OverviewStats::default()),
                vec![],
            ),
        );
        players.insert(
            enemy,
            PlayerSnapshot::new(
                &bob,
                enemy,
                OverviewResult::Error(TaskError::new(ErrorKind::Timeout, "slow")),
                vec![],
            ),
        );

        let value = serde_json::to_value(BatchReport::new(players)).unwrap();
        assert_eq!(value["main"]["username"], "Alice");
        assert_eq!(value["main"]["Top Operators"], json!([]));
        assert_eq!(value["allies"], json!([]));
        assert_eq!(value["enemies"][0]["overview"]["error_kind"], "Timeout");
        assert_eq!(value["enemies"][0]["platform"], "xbox");
    }
}
