use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// FetchError
///
/// Failure surface of a page fetch. Every variant is eventually collapsed to
/// an `Unavailable` outcome by the checker, but the cause stays diagnosable
/// in logs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("navigation timed out after {0}s")]
    Timeout(u64),
    #[error("screenshot capture failed: {0}")]
    Screenshot(String),
}

/// ScreenshotPair
///
/// Two page screenshots encoded as `data:image/png;base64,...` URLs: one at
/// the top of the page and one after scrolling to the vertical midpoint.
#[derive(Debug, Clone)]
pub struct ScreenshotPair {
    pub top: String,
    pub middle: String,
}

/// PageCapture
///
/// Everything a fetch could extract from a rendered page. Either side may be
/// absent independently; the checker decides what is still usable.
#[derive(Debug, Clone, Default)]
pub struct PageCapture {
    pub html: Option<String>,
    pub screenshots: Option<ScreenshotPair>,
}

/// PageFetcher
///
/// The single browser-automation abstraction. The automation engine behind it
/// is swappable: production uses the CDP implementation below, tests use
/// in-memory mocks.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageCapture, FetchError>;
}

/// ChromiumFetcher
///
/// Headless-Chrome implementation of `PageFetcher` driven over the Chrome
/// DevTools Protocol. A fresh browser process is launched and torn down per
/// call; there is no session reuse or caching across checks.
pub struct ChromiumFetcher {
    nav_timeout: Duration,
    settle_delay: Duration,
}

impl ChromiumFetcher {
    pub fn new(nav_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            nav_timeout,
            settle_delay,
        }
    }

    fn png_params() -> ScreenshotParams {
        ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build()
    }

    /// Navigates and extracts HTML plus screenshots from an already-launched
    /// browser. Split out from `fetch` so teardown runs regardless of outcome.
    async fn capture(&self, browser: &Browser, url: &str) -> Result<PageCapture, FetchError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        tokio::time::timeout(self.nav_timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::Timeout(self.nav_timeout.as_secs()))?
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        // Let network activity settle; a slow page just gets the grace period.
        let _ = tokio::time::timeout(self.nav_timeout, page.wait_for_navigation()).await;
        tokio::time::sleep(self.settle_delay).await;

        let html = match page.content().await {
            Ok(body) if !body.trim().is_empty() => {
                tracing::info!(
                    "[WebScraper] extracted HTML from {} ({} characters)",
                    url,
                    body.len()
                );
                Some(format!("url: {}\n{}", url, body))
            }
            Ok(_) => {
                tracing::warn!("[WebScraper] no content extracted from {}", url);
                None
            }
            Err(e) => {
                tracing::warn!("[WebScraper] failed to read page content of {}: {}", url, e);
                None
            }
        };

        // Screenshots are best-effort: a capture failure leaves them absent
        // but does not abort the check while HTML is still available.
        let screenshots = match self.take_screenshots(&page).await {
            Ok(pair) => {
                tracing::info!("[WebScraper] captured screenshots for {}", url);
                Some(pair)
            }
            Err(e) => {
                tracing::error!(
                    "[WebScraper] failed to capture screenshots from {}: {}",
                    url,
                    e
                );
                None
            }
        };

        Ok(PageCapture { html, screenshots })
    }

    /// One screenshot at the top, one after scrolling to scrollHeight / 2.
    async fn take_screenshots(&self, page: &Page) -> Result<ScreenshotPair, FetchError> {
        let top = page
            .screenshot(Self::png_params())
            .await
            .map_err(|e| FetchError::Screenshot(e.to_string()))?;

        let scroll_height: i64 = page
            .evaluate("document.body.scrollHeight")
            .await
            .ok()
            .and_then(|res| res.into_value::<i64>().ok())
            .unwrap_or(0);

        let _ = page
            .evaluate(format!("window.scrollTo(0, {})", scroll_height / 2))
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let middle = page
            .screenshot(Self::png_params())
            .await
            .map_err(|e| FetchError::Screenshot(e.to_string()))?;

        Ok(ScreenshotPair {
            top: data_url(&top),
            middle: data_url(&middle),
        })
    }
}

fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn fetch(&self, url: &str) -> Result<PageCapture, FetchError> {
        tracing::info!("[WebScraper] attempting to open URL headless: {}", url);

        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(FetchError::Launch)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        // The CDP event loop must be polled for the connection to stay alive.
        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.capture(&browser, url).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("[WebScraper] browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        driver.abort();

        result
    }
}
