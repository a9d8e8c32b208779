mod browser;
mod scrapers;

pub use browser::{
    chromium::{find_chromium, BrowserSettings, ChromiumNavigator},
    PageNavigator, PagePlan, RenderedDocument,
};
pub use scrapers::{
    locator::{LabelQuery, StatLocator},
    operators::extract_operators,
    overview::OverviewExtractor,
};
