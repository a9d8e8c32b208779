use super::{PageNavigator, PagePlan, RenderedDocument, WaitFor};
use crate::domain::ProfileUrl;
use crate::error::NavigationError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

const BROWSER_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--blink-settings=imagesEnabled=false",
    "--disable-blink-features=AutomationControlled",
    "--lang=en-US",
    "--accept-lang=en-US",
];

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    pub page_load_timeout: Duration,
    pub user_agent: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            page_load_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub fn find_chromium() -> Option<PathBuf> {
    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Opens every page in its own freshly launched browser, so no cookies,
/// cache or profile state carry over between calls.
pub struct ChromiumNavigator {
    settings: BrowserSettings,
}

impl ChromiumNavigator {
    pub fn new(settings: BrowserSettings) -> Self {
        if let Some(path) = &settings.chrome_path {
            info!("Using browser binary {}", path.display());
        }
        Self { settings }
    }

    async fn launch(
        &self,
        profile_dir: &std::path::Path,
    ) -> Result<(Browser, JoinHandle<()>), NavigationError> {
        let mut builder = BrowserConfig::builder()
            .args(BROWSER_ARGS.iter().copied())
            .user_data_dir(profile_dir)
            .request_timeout(self.settings.page_load_timeout);

        if let Some(path) = self.settings.chrome_path.clone().or_else(find_chromium) {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(NavigationError::Browser)?;
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            drive_handler(&mut handler).await;
        });

        Ok((browser, handler_task))
    }

    async fn render(
        &self,
        browser: &Browser,
        url: &ProfileUrl,
        plan: &PagePlan,
    ) -> Result<RenderedDocument, NavigationError> {
        let page = browser.new_page("about:blank").await?;

        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            HIDE_WEBDRIVER_SCRIPT,
        ))
        .await?;

        self.navigate(&page, url).await?;
        sleep(plan.settle).await;

        let title = page.get_title().await?.unwrap_or_default();
        if super::is_interstitial_title(&title) {
            warn!("Interstitial served for {}: '{}'", url, title);
            return Err(NavigationError::Blocked);
        }

        if let Some(wait) = &plan.wait_for {
            if !wait_for_selector(&page, wait).await {
                warn!(
                    "'{}' did not appear within {:?} on {}",
                    wait.selector, wait.timeout, url
                );
            }
        }

        if let Some(pause) = plan.scroll_settle {
            if let Err(e) = page.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await {
                debug!("Scroll skipped on {}: {}", url, e);
            }
            sleep(pause).await;
        }

        let html = page.content().await?;
        Ok(RenderedDocument {
            url: url.to_string(),
            title,
            html,
        })
    }

    async fn navigate(&self, page: &Page, url: &ProfileUrl) -> Result<(), NavigationError> {
        let limit = self.settings.page_load_timeout;
        info!("Navigating to {}", url);

        match timeout(limit, page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(CdpError::Timeout)) | Err(_) => {
                Err(NavigationError::Timeout(limit.as_secs()))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PageNavigator for ChromiumNavigator {
    async fn open(
        &self,
        url: &ProfileUrl,
        plan: &PagePlan,
    ) -> Result<RenderedDocument, NavigationError> {
        let profile_dir = tempfile::tempdir()
            .map_err(|e| NavigationError::Browser(format!("profile dir: {e}")))?;
        let (mut browser, handler_task) = self.launch(profile_dir.path()).await?;

        let result = self.render(&browser, url, plan).await;

        // Teardown runs whatever `render` returned.
        if let Err(e) = browser.close().await {
            debug!("Browser close failed for {}: {}", url, e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser wait failed for {}: {}", url, e);
        }
        handler_task.abort();

        result
    }
}

/// Pumps CDP events until the connection ends or reports an error. Returns
/// how many events were handled.
async fn drive_handler<S, E>(events: &mut S) -> usize
where
    S: Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut handled = 0;
    while let Some(event) = events.next().await {
        handled += 1;
        if let Err(e) = event {
            debug!("Browser handler stopped: {}", e);
            break;
        }
    }
    handled
}

async fn wait_for_selector(page: &Page, wait: &WaitFor) -> bool {
    let deadline = Instant::now() + wait.timeout;
    loop {
        if page.find_element(wait.selector.as_str()).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PageKind, Platform, PlayerIdentity};

    #[tokio::test]
    async fn handler_stops_at_first_error() {
        let mut events = futures::stream::iter(vec![Ok(()), Ok(()), Err("socket closed"), Ok(())]);
        assert_eq!(drive_handler(&mut events).await, 3);

        let mut clean = futures::stream::iter(vec![Ok::<(), &str>(()); 4]);
        assert_eq!(drive_handler(&mut clean).await, 4);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium and network access
    async fn renders_a_live_profile_page() {
        let navigator = ChromiumNavigator::new(BrowserSettings::default());
        let identity = PlayerIdentity::new("Beaulo.TSM", Platform::Ubisoft).unwrap();
        let url = identity.profile_url(PageKind::Overview);
        let plan = PagePlan::for_page(PageKind::Overview, Duration::from_secs(15));

        match navigator.open(&url, &plan).await {
            Ok(doc) => assert!(doc.html.contains("<html")),
            Err(NavigationError::Blocked) => {}
            Err(e) => panic!("navigation failed: {e}"),
        }
    }
}
