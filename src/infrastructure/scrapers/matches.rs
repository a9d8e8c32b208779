//! Recent matches list at the bottom of the overview page.

use super::element_text;
use crate::domain::MatchRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

pub const MAX_RECENT_MATCHES: usize = 4;

const MAP_KEYWORDS: &[&str] = &[
    "Labs", "Border", "Bank", "Kanal", "Consulate", "Villa", "Chalet", "Club", "Kafe", "Oregon",
    "Theme", "Tower", "Yacht", "Fortress", "Outback", "Stadium", "Favela", "Skyscraper", "Emerald",
];

const MODE_KEYWORDS: &[&str] = &["Ranked", "Unranked", "Casual", "Quick Match"];

static MATCH_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[class*='match-row']").unwrap());
static ANY_DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div[class]").unwrap());
static SPANS: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());

static SCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*:\s*(\d+)").unwrap());
static KD: Lazy<Regex> = Lazy::new(|| Regex::new(r"K/D[^\d/]*(\d+\.\d+)").unwrap());
static KDA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"K/D/A[^\d]*(\d+)[^\d]+(\d+)[^\d]+(\d+)").unwrap());
static HEADSHOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"HS\s*%[^\d]*(\d+(?:\.\d+)?%)").unwrap());

/// Up to [`MAX_RECENT_MATCHES`] matches, newest first. The tracker renders
/// every row twice, so only every other candidate is read.
pub fn extract_recent_matches(root: ElementRef<'_>) -> Vec<MatchRecord> {
    let mut rows: Vec<ElementRef<'_>> = root.select(&MATCH_ROWS).collect();
    if rows.is_empty() {
        rows = root
            .select(&ANY_DIV)
            .filter(|div| {
                let class = div.value().attr("class").unwrap_or_default().to_lowercase();
                class.contains("match") && class.contains("row")
            })
            .collect();
    }

    rows.into_iter()
        .step_by(2)
        .take(MAX_RECENT_MATCHES)
        .map(parse_match_row)
        .collect()
}

fn parse_match_row(row: ElementRef<'_>) -> MatchRecord {
    let mut record = MatchRecord::default();

    let class = row.value().attr("class").unwrap_or_default().to_lowercase();
    if class.contains("win") {
        record.result = "Win".to_string();
    } else if class.contains("loss") {
        record.result = "Loss".to_string();
    }

    let spans: Vec<String> = row
        .select(&SPANS)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    if let Some(map) = spans.iter().find(|text| {
        MAP_KEYWORDS.iter().any(|keyword| text.contains(keyword))
            && !text.to_lowercase().contains("ago")
    }) {
        record.map = map.clone();
    }
    if let Some(mode) = spans.iter().find(|text| MODE_KEYWORDS.contains(&text.as_str())) {
        record.mode = mode.clone();
    }

    let text = element_text(row);

    if let Some(caps) = SCORE.captures(&text) {
        record.score = format!("{} : {}", &caps[1], &caps[2]);
    }
    if let Some(caps) = KD.captures(&text) {
        record.kd_ratio = caps[1].to_string();
    }
    if let Some(caps) = KDA.captures(&text) {
        record.kills = caps[1].to_string();
        record.deaths = caps[2].to_string();
        record.assists = caps[3].to_string();
    }
    if let Some(caps) = HEADSHOTS.captures(&text) {
        record.headshot_rate = caps[1].to_string();
    }

    record
}
