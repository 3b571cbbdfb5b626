use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Accept the consent banner if one is shown
const ACCEPT_COOKIES: &str = r#"
    const button = document.querySelector(
        'button[id*="accept"], button[id*="didomi-notice-agree"], button[class*="accept"]'
    );
    if (button) button.click();
"#;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Time given to lazy content after scrolling
const SETTLE: Duration = Duration::from_secs(2);

/// One page to render
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub url: &'a str,
    /// Selector to wait for before the page counts as loaded
    pub ready: &'a str,
    /// Read the page anyway when `ready` never appears
    pub ready_optional: bool,
    /// Script to run once the page is ready
    pub script: Option<&'a str>,
}

/// Something that can turn a URL into rendered HTML
pub trait PageSource {
    fn render(&self, request: &PageRequest<'_>) -> Result<String>;
}

/// Headless Chrome session shared by every page of a run
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process
    _browser: Browser,
    tab: Arc<Tab>,
    page_timeout: Duration,
}

impl ChromeSession {
    /// Launch Chrome and open the tab every page is rendered in
    pub fn launch(headless: bool, page_timeout: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(600))
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(page_timeout);

        Ok(Self {
            _browser: browser,
            tab,
            page_timeout,
        })
    }
}

impl PageSource for ChromeSession {
    fn render(&self, request: &PageRequest<'_>) -> Result<String> {
        debug!("Opening {}", request.url);

        self.tab
            .navigate_to(request.url)
            .with_context(|| format!("Failed to navigate to {}", request.url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not finish", request.url))?;
        if let Err(e) = self
            .tab
            .wait_for_element_with_custom_timeout(request.ready, self.page_timeout)
        {
            if !request.ready_optional {
                return Err(e).with_context(|| {
                    format!(
                        "'{}' did not appear on {} within {:?}",
                        request.ready, request.url, self.page_timeout
                    )
                });
            }
            debug!("'{}' not on {}, reading the page as is", request.ready, request.url);
        }

        let _ = self.tab.evaluate(ACCEPT_COOKIES, false);
        let _ = self.tab.evaluate(SCROLL_TO_BOTTOM, false);
        if let Some(script) = request.script {
            if let Err(e) = self.tab.evaluate(script, false) {
                debug!("Page script failed on {}: {}", request.url, e);
            }
        }
        thread::sleep(SETTLE);

        let html = self
            .tab
            .get_content()
            .with_context(|| format!("Failed to read HTML of {}", request.url))?;
        debug!("Captured {} bytes from {}", html.len(), request.url);

        Ok(html)
    }
}
