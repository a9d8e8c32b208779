pub(crate) mod chromium;

use crate::domain::{PageKind, ProfileUrl};
use crate::error::NavigationError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;

const INTERSTITIAL_TITLES: &[&str] = &["just a moment", "attention required"];

pub const RANK_READY_SELECTOR: &str = ".text-24.text-20, .trn-defstat__value, .stat-value";

/// A fully rendered page, detached from the browser that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub url: String,
    pub title: String,
    pub html: String,
}

impl RenderedDocument {
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        static TITLE: Lazy<Selector> =
            Lazy::new(|| Selector::parse("title").expect("valid title selector"));

        let html = html.into();
        let title = Html::parse_document(&html)
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        Self {
            url: url.into(),
            title,
            html,
        }
    }

    pub fn is_interstitial(&self) -> bool {
        is_interstitial_title(&self.title)
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

pub fn is_interstitial_title(title: &str) -> bool {
    let title = title.to_lowercase();
    INTERSTITIAL_TITLES.iter().any(|marker| title.contains(marker))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    pub settle: Duration,
    pub wait_for: Option<WaitFor>,
    pub scroll_settle: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitFor {
    pub selector: String,
    pub timeout: Duration,
}

impl PagePlan {
    pub fn for_page(kind: PageKind, wait_timeout: Duration) -> Self {
        match kind {
            PageKind::Overview => Self {
                settle: Duration::from_secs(3),
                wait_for: Some(WaitFor {
                    selector: RANK_READY_SELECTOR.to_string(),
                    timeout: wait_timeout,
                }),
                scroll_settle: Some(Duration::from_secs(2)),
            },
            PageKind::Operators => Self {
                settle: Duration::from_secs(8),
                wait_for: None,
                scroll_settle: Some(Duration::from_secs(2)),
            },
        }
    }
}

/// Loads a profile page and hands back its rendered markup.
///
/// Implementations own whatever session they open and must release it before
/// returning, on every path.
#[async_trait]
pub trait PageNavigator: Send + Sync {
    async fn open(
        &self,
        url: &ProfileUrl,
        plan: &PagePlan,
    ) -> Result<RenderedDocument, NavigationError>;
}
