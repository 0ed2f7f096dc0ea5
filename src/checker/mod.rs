use scraper::{Html, Selector};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::HarmfulVerdict;

pub mod browser;
pub mod classify;

pub use browser::{ChromiumFetcher, FetchError, PageCapture, PageFetcher, ScreenshotPair};
pub use classify::{AzureOpenAiClassifier, ClassifyError, VerdictClassifier};

use std::time::Duration;

/// Stand-in text when a page rendered no usable HTML but screenshots exist.
const NO_HTML_PLACEHOLDER: &str = "No HTML content available.";

/// UnavailableReason
///
/// Why a check produced no verdict. The original contract collapses all of
/// these to a neutral response at the HTTP layer, but the cause is preserved
/// here so it can be logged and tested.
#[derive(Debug, Error)]
pub enum UnavailableReason {
    #[error("page fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("page had no usable content")]
    EmptyPage,
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
}

/// CheckOutcome
///
/// Result of a harmful-content check: either a definite verdict from the
/// classifier, or an explanation of why none could be produced.
#[derive(Debug)]
pub enum CheckOutcome {
    Verdict(HarmfulVerdict),
    Unavailable(UnavailableReason),
}

/// HarmfulChecker
///
/// The content-classification service: fetch a page in a headless browser,
/// reduce it to visible text plus two screenshots, and ask the classifier for
/// a structured verdict. Constructed once at process start and shared through
/// the application state; both seams are injected so the automation engine
/// and the model backend are swappable.
pub struct HarmfulChecker {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<dyn VerdictClassifier>,
}

/// CheckerState
///
/// The concrete type used to share the checker service across the application
/// state.
pub type CheckerState = Arc<HarmfulChecker>;

impl HarmfulChecker {
    pub fn new(fetcher: Arc<dyn PageFetcher>, classifier: Arc<dyn VerdictClassifier>) -> Self {
        Self {
            fetcher,
            classifier,
        }
    }

    /// Production wiring: headless Chromium fetcher + Azure OpenAI classifier.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(ChromiumFetcher::new(
                Duration::from_secs(config.checker_nav_timeout_secs),
                Duration::from_secs(config.checker_settle_secs),
            )),
            Arc::new(AzureOpenAiClassifier::new(config)),
        )
    }

    /// check
    ///
    /// Runs the full sequential pipeline for one URL. Never returns an error:
    /// every failure is folded into `CheckOutcome::Unavailable` with its cause
    /// logged, keeping the caller's contract uniform.
    pub async fn check(&self, url: &str) -> CheckOutcome {
        tracing::info!("[HarmfulChecker] checking URL: {}", url);

        let capture = match self.fetcher.fetch(url).await {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!("[HarmfulChecker] failed to fetch {}: {}", url, e);
                return CheckOutcome::Unavailable(UnavailableReason::Fetch(e));
            }
        };

        if capture.html.is_none() && capture.screenshots.is_none() {
            tracing::warn!(
                "[HarmfulChecker] no HTML content and no images for {}, skipping harmful check",
                url
            );
            return CheckOutcome::Unavailable(UnavailableReason::EmptyPage);
        }

        let text = capture
            .html
            .as_deref()
            .map(visible_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_HTML_PLACEHOLDER.to_string());

        match self
            .classifier
            .classify(&text, capture.screenshots.as_ref())
            .await
        {
            Ok(verdict) => {
                if verdict.is_harmful {
                    tracing::info!(
                        "[HarmfulChecker] harmful content detected in {}: {}",
                        url,
                        verdict.summary_harmful
                    );
                } else {
                    tracing::info!("[HarmfulChecker] no harmful content detected in {}", url);
                }
                CheckOutcome::Verdict(verdict)
            }
            Err(e) => {
                tracing::error!("[HarmfulChecker] error checking URL {}: {}", url, e);
                CheckOutcome::Unavailable(UnavailableReason::Classify(e))
            }
        }
    }
}

/// visible_text
///
/// Strips markup down to the page's visible text, collapses whitespace, and
/// removes literal brace characters so the extracted text can never be
/// interpreted as a template placeholder downstream.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let raw = match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .flat_map(|body| body.text())
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => String::new(),
    };

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(['{', '}'], "")
}
