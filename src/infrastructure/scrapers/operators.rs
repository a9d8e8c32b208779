use super::{element_text, first_attr, first_text, is_not_found_page, or_sentinel, parse_selectors};
use crate::domain::OperatorRecord;
use crate::infrastructure::browser::RenderedDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

pub const MAX_OPERATORS: usize = 4;

static ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static BADGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src*='operators/badges']").unwrap());
static KEYED_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr[data-key]").unwrap());
static HEADER_CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static NAME: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(&[".stat-value .truncate", ".truncate"]));
static IMAGE: Lazy<Vec<Selector>> = Lazy::new(|| parse_selectors(&["img"]));
static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})*$|^\d+$").unwrap());

// 1,204 | 987 | 1.32 | 55.1%
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?%?|\d+(?:\.\d+)?%?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorsState {
    Loading,
    CheckBlocked,
    Check404,
    LocateRows,
    ParseRows,
    Done,
}

#[derive(Debug, Clone)]
pub struct OperatorsOutcome {
    pub operators: Vec<OperatorRecord>,
    pub visited: Vec<OperatorsState>,
}

pub fn extract_operators(doc: &RenderedDocument) -> Vec<OperatorRecord> {
    run(doc).operators
}

/// Blocked and missing profiles end in an empty list.
pub fn run(doc: &RenderedDocument) -> OperatorsOutcome {
    let html = doc.parse();
    let root = html.root_element();

    let mut visited = Vec::new();
    let mut operators = Vec::new();
    let mut rows = Vec::new();
    let mut state = OperatorsState::Loading;

    loop {
        visited.push(state);
        state = match state {
            OperatorsState::Loading => OperatorsState::CheckBlocked,
            OperatorsState::CheckBlocked if doc.is_interstitial() => {
                debug!(url = %doc.url, "operators page blocked");
                OperatorsState::Done
            }
            OperatorsState::CheckBlocked => OperatorsState::Check404,
            OperatorsState::Check404 if is_not_found_page(root) => OperatorsState::Done,
            OperatorsState::Check404 => OperatorsState::LocateRows,
            OperatorsState::LocateRows => {
                rows = locate_rows(root);
                OperatorsState::ParseRows
            }
            OperatorsState::ParseRows => {
                operators = rows.iter().map(|row| parse_row(*row)).collect();
                OperatorsState::Done
            }
            OperatorsState::Done => break,
        };
    }

    debug!(url = %doc.url, count = operators.len(), "operators extracted");
    OperatorsOutcome { operators, visited }
}

fn locate_rows(root: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows: Vec<_> = root
        .select(&ROWS)
        .filter(|row| row.select(&BADGE).next().is_some())
        .take(MAX_OPERATORS)
        .collect();
    if rows.is_empty() {
        rows = root.select(&KEYED_ROWS).take(MAX_OPERATORS).collect();
    }
    rows
}

fn parse_row(row: ElementRef<'_>) -> OperatorRecord {
    let name = first_text(row, &NAME).or_else(|| first_attr(row, &IMAGE, "alt"));
    let image = first_attr(row, &IMAGE, "src");

    let columns = ColumnMap::for_row(row);
    let cells: Vec<ElementRef<'_>> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .collect();
    let anchored = |index: Option<usize>| {
        index
            .and_then(|i| cells.get(i))
            .and_then(|cell| cell_value(*cell))
    };

    let guessed = PositionalStats::classify(&element_text(row));

    OperatorRecord {
        name: or_sentinel(name),
        image_reference: or_sentinel(image),
        rounds_played: or_sentinel(
            anchored(columns.rounds)
                .filter(|value| COUNT.is_match(value))
                .or(guessed.rounds),
        ),
        win_rate: or_sentinel(anchored(columns.win_rate).or(guessed.win_rate)),
        headshot_rate: or_sentinel(anchored(columns.headshot_rate).or(guessed.headshot_rate)),
        kd_ratio: or_sentinel(anchored(columns.kd_ratio).or(guessed.kd_ratio)),
    }
}

fn cell_value(cell: ElementRef<'_>) -> Option<String> {
    let text = element_text(cell);
    if text.is_empty() {
        return None;
    }
    Some(
        NUMBER
            .find(&text)
            .map(|m| m.as_str().to_string())
            .unwrap_or(text),
    )
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnMap {
    rounds: Option<usize>,
    win_rate: Option<usize>,
    headshot_rate: Option<usize>,
    kd_ratio: Option<usize>,
}

impl ColumnMap {
    fn for_row(row: ElementRef<'_>) -> Self {
        let Some(table) = row
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "table")
        else {
            return Self::default();
        };

        let headers: Vec<String> = table
            .select(&HEADER_CELLS)
            .map(|th| element_text(th).to_lowercase())
            .collect();
        Self::from_headers(&headers)
    }

    fn from_headers(headers: &[String]) -> Self {
        let column = |terms: &[&str]| {
            headers
                .iter()
                .position(|header| terms.iter().any(|term| header.contains(*term)))
        };
        // "Time Played" is a duration, never a round count.
        let rounds = column(&["round"]).or_else(|| {
            headers
                .iter()
                .position(|header| header.contains("played") && !header.contains("time"))
        });
        Self {
            rounds,
            win_rate: column(&["win"]),
            headshot_rate: column(&["hs", "headshot"]),
            kd_ratio: column(&["k/d", "kd"]),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PositionalStats {
    rounds: Option<String>,
    win_rate: Option<String>,
    headshot_rate: Option<String>,
    kd_ratio: Option<String>,
}

impl PositionalStats {
    /// Integers of three or more digits are rounds played, percentages are
    /// win rate then headshot rate, the first plain decimal is K/D.
    fn classify(text: &str) -> Self {
        let tokens: Vec<&str> = NUMBER.find_iter(text).map(|m| m.as_str()).collect();
        let mut percentages = tokens.iter().filter(|t| t.ends_with('%'));

        let rounds = tokens.iter().find(|t| {
            !t.contains('%')
                && !t.contains('.')
                && t.chars().filter(char::is_ascii_digit).count() >= 3
        });
        let kd = tokens.iter().find(|t| t.contains('.') && !t.contains('%'));

        Self {
            rounds: rounds.map(|t| t.to_string()),
            win_rate: percentages.next().map(|t| t.to_string()),
            headshot_rate: percentages.next().map(|t| t.to_string()),
            kd_ratio: kd.map(|t| t.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SENTINEL;

    const OPERATORS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/operators.html"));
    const INTERSTITIAL: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/interstitial.html"));
    const NOT_FOUND: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/not_found.html"));

    fn doc(html: &str) -> RenderedDocument {
        RenderedDocument::from_html("https://r6.tracker.network/test", html)
    }

    fn page(rows: &str) -> RenderedDocument {
        doc(&format!(
            "<html><head><title>Operators</title></head><body><table><tbody>{rows}</tbody></table></body></html>"
        ))
    }

    #[test]
    fn reads_first_four_rows_through_header() {
        let outcome = run(&doc(OPERATORS));
        let ops = outcome.operators;

        assert_eq!(ops.len(), MAX_OPERATORS);
        let names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Ash", "Jäger", "Thermite", "Valkyrie"]);

        let ash = &ops[0];
        assert!(ash.image_reference.ends_with("operators/badges/ash.png"));
        assert_eq!(ash.rounds_played, "1,204");
        assert_eq!(ash.win_rate, "55.1%");
        assert_eq!(ash.kd_ratio, "1.32");
        assert_eq!(ash.headshot_rate, "61.0%");
        assert_eq!(outcome.visited.last(), Some(&OperatorsState::Done));
    }

    #[test]
    fn blocked_page_is_empty_not_error() {
        let outcome = run(&doc(INTERSTITIAL));
        assert!(outcome.operators.is_empty());
        assert_eq!(
            outcome.visited,
            [OperatorsState::Loading, OperatorsState::CheckBlocked, OperatorsState::Done]
        );
    }

    #[test]
    fn not_found_page_is_empty() {
        let outcome = run(&doc(NOT_FOUND));
        assert!(outcome.operators.is_empty());
        assert!(!outcome.visited.contains(&OperatorsState::LocateRows));
    }

    #[test]
    fn positional_fallback_without_header() {
        let doc = page(
            r#"<tr><td><img src="https://cdn.test/operators/badges/ash.png" alt="Ash"></td>
               <td>312</td><td>48.0%</td><td>0.95</td><td>21.5%</td><td>12h</td></tr>"#,
        );
        let ops = extract_operators(&doc);

        assert_eq!(ops.len(), 1);
        let ash = &ops[0];
        assert_eq!(ash.name, "Ash");
        assert_eq!(ash.rounds_played, "312");
        assert_eq!(ash.win_rate, "48.0%");
        assert_eq!(ash.headshot_rate, "21.5%");
        assert_eq!(ash.kd_ratio, "0.95");
    }

    #[test]
    fn header_survives_reordered_columns() {
        let doc = doc(
            r#"<html><head><title>Operators</title></head><body><table>
               <thead><tr><th>Operator</th><th>HS %</th><th>K/D</th><th>Win %</th><th>Rounds Played</th></tr></thead>
               <tbody><tr><td><img src="https://cdn.test/operators/badges/mute.png" alt="Mute"></td>
               <td>33.3%</td><td>1.01</td><td>51.5%</td><td>1,010</td></tr></tbody></table></body></html>"#,
        );
        let mute = &extract_operators(&doc)[0];
        assert_eq!(mute.headshot_rate, "33.3%");
        assert_eq!(mute.win_rate, "51.5%");
        assert_eq!(mute.kd_ratio, "1.01");
        assert_eq!(mute.rounds_played, "1,010");
    }

    #[test]
    fn keyed_rows_when_no_badges() {
        let rows: String = (1..=6)
            .map(|i| format!(r#"<tr data-key="op{i}"><td><span class="truncate">Op{i}</span></td><td>1{i}0</td></tr>"#))
            .collect();
        let ops = extract_operators(&page(&rows));

        assert_eq!(ops.len(), MAX_OPERATORS);
        assert_eq!(ops[3].name, "Op4");
        assert_eq!(ops[0].rounds_played, "110");
        assert_eq!(ops[0].image_reference, SENTINEL);
        assert_eq!(ops[0].win_rate, SENTINEL);
    }

    #[test]
    fn classifies_tokens_by_shape() {
        let stats = PositionalStats::classify("Ash 1,204 55.1% 1.32 61.0% 48h");
        assert_eq!(stats.rounds.as_deref(), Some("1,204"));
        assert_eq!(stats.win_rate.as_deref(), Some("55.1%"));
        assert_eq!(stats.headshot_rate.as_deref(), Some("61.0%"));
        assert_eq!(stats.kd_ratio.as_deref(), Some("1.32"));

        assert_eq!(PositionalStats::classify("no numbers"), PositionalStats::default());
    }

    #[test]
    fn time_played_column_is_not_rounds() {
        let doc = doc(
            r#"<html><head><title>Operators</title></head><body><table>
               <thead><tr><th>Operator</th><th>Time Played</th><th>Win %</th><th>K/D</th><th>HS %</th><th>Matches</th></tr></thead>
               <tbody><tr><td><img src="https://cdn.test/operators/badges/ash.png" alt="Ash"></td>
               <td>48h</td><td>55.1%</td><td>1.32</td><td>61.0%</td><td>1,204</td></tr></tbody></table></body></html>"#,
        );
        let ash = &extract_operators(&doc)[0];
        assert_eq!(ash.rounds_played, "1,204");
        assert_eq!(ash.win_rate, "55.1%");
        assert_eq!(ash.headshot_rate, "61.0%");
    }

    #[test]
    fn anchored_rounds_must_be_a_count() {
        let doc = doc(
            r#"<html><head><title>Operators</title></head><body><table>
               <thead><tr><th>Operator</th><th>Rounds</th><th>Win %</th></tr></thead>
               <tbody><tr><td><img src="https://cdn.test/operators/badges/ash.png" alt="Ash"></td>
               <td>52.0%</td><td>2,310</td></tr></tbody></table></body></html>"#,
        );
        let ash = &extract_operators(&doc)[0];
        assert_eq!(ash.rounds_played, "2,310");
    }

    #[test]
    fn maps_header_columns() {
        let headers: Vec<String> = ["operator", "rounds", "win %", "k/d", "hs %", "time played"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let map = ColumnMap::from_headers(&headers);
        assert_eq!(
            map,
            ColumnMap {
                rounds: Some(1),
                win_rate: Some(2),
                headshot_rate: Some(4),
                kd_ratio: Some(3),
            }
        );

        let headers: Vec<String> = ["operator", "time played", "matches played"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(ColumnMap::from_headers(&headers).rounds, Some(2));
    }
}
