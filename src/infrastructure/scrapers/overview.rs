use super::locator::{LabelQuery, StatLocator};
use super::matches::extract_recent_matches;
use super::{element_text, first_attr, is_not_found_page, or_sentinel, parse_selectors};
use crate::domain::{ErrorKind, OverviewResult, OverviewStats, StatRecord, TaskError};
use crate::infrastructure::browser::{RenderedDocument, RANK_READY_SELECTOR};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::debug;

pub const RANK_POINTS: &str = "Rank Points";
pub const RANK_IMAGE: &str = "Rank Image URL";
pub const LEVEL: &str = "Level";
pub const LIFETIME_MATCHES: &str = "Lifetime Matches";
pub const TIME_PLAYED: &str = "Time Played";
pub const SEASON_KD: &str = "Season K/D";
pub const SEASON_WIN_RATE: &str = "Season Win Rate";
pub const SEASON_MATCHES: &str = "Season Matches";
pub const BEST_RANK_IMAGE: &str = "Best Rank Image URL";
pub const BEST_RANK_NAME: &str = "Best Rank Name";
pub const BEST_RANK_RP: &str = "Best Rank RP";

/// Every key a successful overview carries, in output order.
pub const OVERVIEW_KEYS: [&str; 11] = [
    RANK_POINTS,
    RANK_IMAGE,
    LEVEL,
    LIFETIME_MATCHES,
    TIME_PLAYED,
    SEASON_KD,
    SEASON_WIN_RATE,
    SEASON_MATCHES,
    BEST_RANK_IMAGE,
    BEST_RANK_NAME,
    BEST_RANK_RP,
];

const LIFETIME_HEADINGS: &[&str] = &["lifetime overall", "lifetime", "overall"];

const MAX_SECTION_HOPS: usize = 3;

static RANK_POINTS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(RANK_READY_SELECTOR).unwrap());
static RANK_IMAGE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&["img.size-14", "img.trn-defstat__icon", "img[alt*='Rank']"])
});
static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static SEASON_SECTION: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(&["section.season-overview", ".season-overview"]));
static PEAKS_FIRST_ROW: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(&[".season-peaks tbody tr", ".season-peaks tr"]));
static PEAK_BADGE: Lazy<Vec<Selector>> = Lazy::new(|| parse_selectors(&["img.size-10", "img"]));
static SPANS: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewState {
    Loading,
    Check404,
    ExtractRank,
    ExtractLifetime,
    ExtractSeason,
    ExtractBestRank,
    ExtractRecentMatches,
    Done,
}

#[derive(Debug, Clone)]
pub struct OverviewOutcome {
    pub result: OverviewResult,
    pub visited: Vec<OverviewState>,
}

pub struct OverviewExtractor<'a> {
    locator: &'a StatLocator,
}

impl<'a> OverviewExtractor<'a> {
    pub fn new(locator: &'a StatLocator) -> Self {
        Self { locator }
    }

    pub fn extract(&self, doc: &RenderedDocument) -> OverviewResult {
        self.run(doc).result
    }

    /// Extraction states fill their keys, sentinel on failure, and always
    /// hand over to the next state.
    pub fn run(&self, doc: &RenderedDocument) -> OverviewOutcome {
        let html = doc.parse();
        let root = html.root_element();

        let mut stats = OverviewStats::default();
        let mut visited = Vec::new();
        let mut state = OverviewState::Loading;

        let result = loop {
            visited.push(state);
            state = match state {
                OverviewState::Loading => {
                    if doc.is_interstitial() {
                        break OverviewResult::from(TaskError::new(
                            ErrorKind::Blocked,
                            "blocked by anti-bot interstitial",
                        ));
                    }
                    OverviewState::Check404
                }
                OverviewState::Check404 => {
                    if is_not_found_page(root) {
                        break OverviewResult::from(TaskError::not_found("player not found"));
                    }
                    OverviewState::ExtractRank
                }
                OverviewState::ExtractRank => {
                    if !extract_rank(root, &mut stats.fields) {
                        break OverviewResult::from(TaskError::not_found(
                            "profile not found or page layout changed",
                        ));
                    }
                    OverviewState::ExtractLifetime
                }
                OverviewState::ExtractLifetime => {
                    self.extract_lifetime(root, &mut stats.fields);
                    OverviewState::ExtractSeason
                }
                OverviewState::ExtractSeason => {
                    self.extract_season(root, &mut stats.fields);
                    OverviewState::ExtractBestRank
                }
                OverviewState::ExtractBestRank => {
                    extract_best_rank(root, &mut stats.fields);
                    OverviewState::ExtractRecentMatches
                }
                OverviewState::ExtractRecentMatches => {
                    stats.recent_matches = extract_recent_matches(root);
                    OverviewState::Done
                }
                OverviewState::Done => break OverviewResult::Stats(stats),
            };
        };

        debug!(url = %doc.url, states = visited.len(), "overview extracted");
        OverviewOutcome { result, visited }
    }

    fn extract_lifetime(&self, root: ElementRef<'_>, fields: &mut StatRecord) {
        let Some(section) = LIFETIME_HEADINGS
            .iter()
            .find_map(|keyword| section_for_heading(root, keyword))
        else {
            debug!("no lifetime section on page");
            for key in [LEVEL, LIFETIME_MATCHES, TIME_PLAYED] {
                fields.insert_unavailable(key);
            }
            return;
        };

        debug!(pairs = ?self.locator.collect(section), "lifetime section");

        let locator = self.locator;
        fields.insert(LEVEL, locator.find_any(section, &LabelQuery::exact("level")));
        fields.insert(
            LIFETIME_MATCHES,
            locator.find_any(
                section,
                &LabelQuery::exact("matches").or(LabelQuery::all_of(&["matches", "played"])),
            ),
        );
        fields.insert(
            TIME_PLAYED,
            locator.find_any(section, &LabelQuery::all_of(&["time", "played"])),
        );
    }

    fn extract_season(&self, root: ElementRef<'_>, fields: &mut StatRecord) {
        let Some(section) = SEASON_SECTION
            .iter()
            .find_map(|selector| root.select(selector).next())
        else {
            for key in [SEASON_KD, SEASON_WIN_RATE, SEASON_MATCHES] {
                fields.insert_unavailable(key);
            }
            return;
        };

        let locator = self.locator;
        fields.insert(
            SEASON_KD,
            locator.find_any(section, &LabelQuery::text("k/d").or(LabelQuery::text("kd"))),
        );
        fields.insert(
            SEASON_WIN_RATE,
            locator.find_any(
                section,
                &LabelQuery::all_of(&["win", "rate"]).or(LabelQuery::text("win %")),
            ),
        );
        fields.insert(SEASON_MATCHES, locator.find(section, "matches"));
    }
}

fn extract_rank(root: ElementRef<'_>, fields: &mut StatRecord) -> bool {
    let points = root
        .select(&RANK_POINTS_SELECTOR)
        .map(element_text)
        .find(|text| !text.is_empty());

    let Some(points) = points else {
        return false;
    };
    fields.insert(RANK_POINTS, points);
    fields.insert(RANK_IMAGE, or_sentinel(first_attr(root, &RANK_IMAGE_SELECTORS, "src")));
    true
}

fn extract_best_rank(root: ElementRef<'_>, fields: &mut StatRecord) {
    let row = PEAKS_FIRST_ROW
        .iter()
        .find_map(|selector| root.select(selector).next());

    let (image, name, points) = match row {
        Some(row) => (
            first_attr(row, &PEAK_BADGE, "src"),
            first_attr(row, &PEAK_BADGE, "alt"),
            row.select(&SPANS)
                .find(|span| element_text(*span).contains("RP"))
                .and_then(|span| span.parent().and_then(ElementRef::wrap))
                .map(element_text),
        ),
        None => (None, None, None),
    };

    fields.insert(BEST_RANK_IMAGE, or_sentinel(image));
    fields.insert(BEST_RANK_NAME, or_sentinel(name));
    fields.insert(BEST_RANK_RP, or_sentinel(points));
}

// Closest section or card around the heading, else its next sibling.
fn section_for_heading<'a>(root: ElementRef<'a>, keyword: &str) -> Option<ElementRef<'a>> {
    let heading = root
        .select(&HEADINGS)
        .find(|h| element_text(*h).to_lowercase().contains(keyword))?;
    let heading_len = element_text(heading).len();

    let enclosing = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_SECTION_HOPS)
        .find(|ancestor| {
            let is_card = ancestor.value().name() == "section"
                || ancestor
                    .value()
                    .attr("class")
                    .is_some_and(|class| class.contains("card"));
            is_card && element_text(*ancestor).len() > heading_len
        });

    enclosing.or_else(|| heading.next_siblings().find_map(ElementRef::wrap))
}
