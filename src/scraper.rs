use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Fully rendered page content.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String, // After redirects
    pub html: String,
}

/// Anything that can turn a URL into rendered HTML.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

/// Query surface over a rendered document.
pub trait Page {
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement + '_>>>;
}

pub trait PageElement {
    /// First descendant matching `selector`.
    fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement + '_>>>;
    fn inner_text(&self) -> String;
    fn attribute(&self, name: &str) -> Option<String>;
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// DOM over static HTML, backed by the `scraper` crate.
pub struct HtmlPage {
    document: Html,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }
}

impl Page for HtmlPage {
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement + '_>>> {
        let css_selector = parse_selector(selector)?;
        Ok(self
            .document
            .select(&css_selector)
            .map(|element| Box::new(HtmlElement { element }) as Box<dyn PageElement + '_>)
            .collect())
    }
}

struct HtmlElement<'a> {
    element: ElementRef<'a>,
}

impl PageElement for HtmlElement<'_> {
    fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement + '_>>> {
        let css_selector = parse_selector(selector)?;
        Ok(self
            .element
            .select(&css_selector)
            .next()
            .map(|element| Box::new(HtmlElement { element }) as Box<dyn PageElement + '_>))
    }

    fn inner_text(&self) -> String {
        self.element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(|v| v.to_string())
    }
}

/// Tracks successive content samples and reports when the page stopped changing.
#[derive(Debug)]
pub struct SettleTracker {
    idle: Duration,
    last: Option<String>,
    changed_at: Instant,
}

impl SettleTracker {
    pub fn new(idle: Duration, now: Instant) -> Self {
        Self {
            idle,
            last: None,
            changed_at: now,
        }
    }

    /// Records a sample; true once the content has been stable for `idle`.
    pub fn observe(&mut self, content: &str, now: Instant) -> bool {
        if self.last.as_deref() == Some(content) {
            now.duration_since(self.changed_at) >= self.idle
        } else {
            self.last = Some(content.to_string());
            self.changed_at = now;
            false
        }
    }

    pub fn into_content(self) -> Option<String> {
        self.last
    }
}

pub struct BrowserPool {
    browsers: Vec<Arc<Browser>>,
    current_index: AtomicUsize,
}

impl BrowserPool {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut browsers = Vec::new();

        // One browser per concurrent store, capped at 3
        for _ in 0..config.max_concurrent_stores.clamp(1, 3) {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false) // Often needed in containerized environments
                .idle_browser_timeout(Duration::from_secs(config.render_timeout * 4))
                .args(vec![
                    std::ffi::OsStr::new("--no-sandbox"),
                    std::ffi::OsStr::new("--disable-dev-shm-usage"),
                    std::ffi::OsStr::new("--disable-gpu"),
                    std::ffi::OsStr::new("--disable-extensions"),
                ])
                .build()
                .map_err(|e| AppError::Scraping(format!("Failed to create launch options: {}", e)))?;

            if let Some(chrome_path) = &config.chrome_path {
                launch_options.path = Some(std::path::PathBuf::from(chrome_path));
            }

            let browser = Browser::new(launch_options)
                .map_err(|e| AppError::Scraping(format!("Failed to launch browser: {}", e)))?;

            browsers.push(Arc::new(browser));
        }

        Ok(Self {
            browsers,
            current_index: AtomicUsize::new(0),
        })
    }

    pub fn get_browser(&self) -> Arc<Browser> {
        let index = self.current_index.fetch_add(1, Ordering::Relaxed) % self.browsers.len();
        self.browsers[index].clone()
    }
}

/// Renders pages in headless Chrome and waits for the DOM to settle.
pub struct ChromePageProvider {
    browser_pool: Arc<BrowserPool>,
    config: ScraperConfig,
}

impl ChromePageProvider {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let browser_pool = Arc::new(BrowserPool::new(&config)?);
        Ok(Self {
            browser_pool,
            config,
        })
    }

    fn render_blocking(browser: &Browser, url: &str, config: &ScraperConfig) -> Result<RenderedPage> {
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Scraping(format!("Failed to create tab: {}", e)))?;

        let result = Self::render_in_tab(&tab, url, config);

        // Close tab to free resources
        let _ = tab.close(true);
        result
    }

    fn render_in_tab(tab: &Tab, url: &str, config: &ScraperConfig) -> Result<RenderedPage> {
        let timeout = Duration::from_secs(config.render_timeout);
        let deadline = Instant::now() + timeout;
        tab.set_default_timeout(timeout);

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::Scraping(format!("Failed to set user agent: {}", e)))?;

        tab.navigate_to(url)
            .map_err(|e| AppError::Scraping(format!("Navigation to {} failed: {}", url, e)))?;

        tab.wait_until_navigated()
            .map_err(|e| AppError::Scraping(format!("Page load failed for {}: {}", url, e)))?;

        let idle = Duration::from_millis(config.network_idle_ms);
        let poll = idle.min(Duration::from_millis(250)).max(Duration::from_millis(50));
        let mut tracker = SettleTracker::new(idle, Instant::now());

        loop {
            let content = tab
                .get_content()
                .map_err(|e| AppError::Scraping(format!("Failed to get page content: {}", e)))?;

            if tracker.observe(&content, Instant::now()) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AppError::Timeout {
                    url: url.to_string(),
                    seconds: config.render_timeout,
                });
            }
            std::thread::sleep(poll);
        }

        // Get final URL after redirects
        let final_url = {
            let current = tab.get_url();
            if current.is_empty() {
                url.to_string()
            } else {
                current
            }
        };

        Ok(RenderedPage {
            url: final_url,
            html: tracker.into_content().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PageProvider for ChromePageProvider {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        let browser = self.browser_pool.get_browser();
        let url = url.to_string();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || Self::render_blocking(&browser, &url, &config))
            .await
            .map_err(|e| AppError::Internal(format!("Render task failed: {}", e)))?
    }
}

/// Serves fixed HTML per URL. URLs without a page are reported unreachable.
#[derive(Debug, Clone, Default)]
pub struct StaticPageProvider {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl StaticPageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Delays every render of `url`, used to simulate a page that never settles.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }
}

#[async_trait]
impl PageProvider for StaticPageProvider {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        match self.pages.get(url) {
            Some(html) => Ok(RenderedPage {
                url: url.to_string(),
                html: html.clone(),
            }),
            None => Err(AppError::Scraping(format!("Navigation to {} failed: unreachable", url))),
        }
    }
}
