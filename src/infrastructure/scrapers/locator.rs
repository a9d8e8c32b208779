use super::{dedupe_slash_segments, element_text, first_text, normalize_text, parse_selectors, text_without};
use crate::domain::{StatRecord, SENTINEL};
use scraper::{ElementRef, Selector};
use tracing::trace;

/// Label text longer than this is prose, not a stat label.
const MAX_LABEL_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Alternative {
    Exact(String),
    AllOf(Vec<String>),
}

impl Alternative {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            Alternative::Exact(label) => normalized == label,
            Alternative::AllOf(terms) => terms.iter().all(|term| normalized.contains(term)),
        }
    }
}

/// What a stat label may look like: any one of several alternatives, compared
/// case-insensitively against normalized label text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    alternatives: Vec<Alternative>,
}

impl LabelQuery {
    pub fn text(label: &str) -> Self {
        Self::all_of(&[label])
    }

    pub fn exact(label: &str) -> Self {
        Self {
            alternatives: vec![Alternative::Exact(fold(label))],
        }
    }

    pub fn all_of(terms: &[&str]) -> Self {
        Self {
            alternatives: vec![Alternative::AllOf(terms.iter().map(|t| fold(t)).collect())],
        }
    }

    pub fn or(mut self, other: LabelQuery) -> Self {
        self.alternatives.extend(other.alternatives);
        self
    }

    pub fn matches(&self, label_text: &str) -> bool {
        let normalized = fold(label_text);
        !normalized.is_empty() && self.alternatives.iter().any(|alt| alt.matches(&normalized))
    }
}

impl From<&str> for LabelQuery {
    fn from(label: &str) -> Self {
        LabelQuery::text(label)
    }
}

fn fold(text: &str) -> String {
    normalize_text(text).to_lowercase()
}

/// One independent way of finding a value for a label.
pub trait Locator: Send + Sync {
    fn name(&self) -> &'static str;

    fn locate(&self, context: ElementRef<'_>, label: &LabelQuery) -> Option<String>;

    fn pairs(&self, _context: ElementRef<'_>) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Finds stat containers by class family, then a label element and a value
/// element inside each one.
pub struct BlockLocator {
    name: &'static str,
    blocks: Vec<Selector>,
    labels: Vec<Selector>,
    values: Vec<Selector>,
}

impl BlockLocator {
    pub fn new(name: &'static str, blocks: &[&str], labels: &[&str], values: &[&str]) -> Self {
        Self {
            name,
            blocks: parse_selectors(blocks),
            labels: parse_selectors(labels),
            values: parse_selectors(values),
        }
    }

    pub fn name_value() -> Self {
        Self::new(
            "name-value",
            &["[class*='name-value']"],
            &[".stat-name .truncate", ".stat-name"],
            &[".stat-value .truncate", ".stat-value"],
        )
    }

    pub fn stat_card() -> Self {
        Self::new(
            "stat-card",
            &[
                "[class*='stat-group']",
                "[class*='stat-card']",
                "[class*='trn-defstat']",
                "div[class*='text-center']",
            ],
            &[".stat-label", ".trn-defstat__name", ".stat-name", ".name"],
            &[".stat-value", ".trn-defstat__value", ".value"],
        )
    }

    fn read_block(&self, block: ElementRef<'_>) -> Option<(String, String)> {
        let label = first_text(block, &self.labels)?;
        let value = first_text(block, &self.values)
            .filter(|value| *value != label)
            .or_else(|| text_without(block, &label))?;
        let value = dedupe_slash_segments(&value);
        (!value.is_empty()).then_some((label, value))
    }
}

impl Locator for BlockLocator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn locate(&self, context: ElementRef<'_>, label: &LabelQuery) -> Option<String> {
        self.blocks.iter().find_map(|selector| {
            context
                .select(selector)
                .filter_map(|block| self.read_block(block))
                .find(|(found, _)| label.matches(found))
                .map(|(_, value)| value)
        })
    }

    fn pairs(&self, context: ElementRef<'_>) -> Vec<(String, String)> {
        self.blocks
            .iter()
            .flat_map(|selector| context.select(selector))
            .filter_map(|block| self.read_block(block))
            .collect()
    }
}

/// Last resort: find the innermost element whose text matches the label,
/// climb to a nearby container and take everything in it but the label.
pub struct TextSearchLocator {
    containers: &'static [&'static str],
    max_hops: usize,
}

impl Default for TextSearchLocator {
    fn default() -> Self {
        Self {
            containers: &["div", "section", "li", "tr", "td", "article"],
            max_hops: 2,
        }
    }
}

impl TextSearchLocator {
    fn label_elements<'a>(
        &self,
        context: ElementRef<'a>,
        label: &LabelQuery,
    ) -> Vec<(ElementRef<'a>, String)> {
        context
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter_map(|element| {
                let text = element_text(element);
                if text.len() > MAX_LABEL_LEN || !label.matches(&text) {
                    return None;
                }
                let child_matches = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .any(|child| label.matches(&element_text(child)));
                (!child_matches).then_some((element, text))
            })
            .collect()
    }
}

impl Locator for TextSearchLocator {
    fn name(&self) -> &'static str {
        "text-search"
    }

    fn locate(&self, context: ElementRef<'_>, label: &LabelQuery) -> Option<String> {
        for (element, label_text) in self.label_elements(context, label) {
            let mut hops = 0;
            for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
                let is_context = ancestor.id() == context.id();
                if self.containers.contains(&ancestor.value().name()) {
                    hops += 1;
                    if let Some(value) = text_without(ancestor, &label_text) {
                        let value = dedupe_slash_segments(&value);
                        if !value.is_empty() {
                            return Some(value);
                        }
                    }
                }
                if is_context || hops >= self.max_hops {
                    break;
                }
            }
        }
        None
    }
}

/// Ordered chain of locator strategies behind one lookup call.
pub struct StatLocator {
    chain: Vec<Box<dyn Locator>>,
}

impl Default for StatLocator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(BlockLocator::name_value()),
            Box::new(BlockLocator::stat_card()),
            Box::new(TextSearchLocator::default()),
        ])
    }
}

impl StatLocator {
    pub fn new(chain: Vec<Box<dyn Locator>>) -> Self {
        Self { chain }
    }

    /// Value for `label` inside `context`, or [`SENTINEL`]. Never fails.
    pub fn find(&self, context: ElementRef<'_>, label: &str) -> String {
        self.find_any(context, &LabelQuery::from(label))
    }

    pub fn find_any(&self, context: ElementRef<'_>, label: &LabelQuery) -> String {
        self.chain
            .iter()
            .find_map(|locator| {
                let found = locator.locate(context, label);
                if found.is_some() {
                    trace!(strategy = locator.name(), ?label, "stat located");
                }
                found
            })
            .unwrap_or_else(|| SENTINEL.to_string())
    }

    pub fn collect(&self, context: ElementRef<'_>) -> StatRecord {
        let mut record = StatRecord::new();
        for (label, value) in self.chain.iter().flat_map(|l| l.pairs(context)) {
            if record.get(&label).is_none() {
                record.insert(label, value);
            }
        }
        record
    }
}
