use async_trait::async_trait;
use mindguard::checker::{
    CheckOutcome, ClassifyError, FetchError, HarmfulChecker, PageCapture, PageFetcher,
    ScreenshotPair, UnavailableReason, VerdictClassifier,
};
use mindguard::models::HarmfulVerdict;
use std::sync::{Arc, Mutex};

// --- Mock Seams ---

/// What the stub fetcher should pretend the browser produced.
enum FetchBehavior {
    Capture(PageCapture),
    NavigationError,
    Timeout,
}

struct StubFetcher {
    behavior: FetchBehavior,
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<PageCapture, FetchError> {
        match &self.behavior {
            FetchBehavior::Capture(capture) => Ok(capture.clone()),
            FetchBehavior::NavigationError => {
                Err(FetchError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()))
            }
            FetchBehavior::Timeout => Err(FetchError::Timeout(30)),
        }
    }
}

/// Records the text it was asked to classify so tests can assert on the
/// extraction step, then returns a canned verdict (or error).
struct RecordingClassifier {
    verdict: Result<HarmfulVerdict, ()>,
    seen_text: Mutex<Option<String>>,
    seen_screenshots: Mutex<bool>,
}

impl RecordingClassifier {
    fn returning(verdict: HarmfulVerdict) -> Self {
        Self {
            verdict: Ok(verdict),
            seen_text: Mutex::new(None),
            seen_screenshots: Mutex::new(false),
        }
    }

    fn failing() -> Self {
        Self {
            verdict: Err(()),
            seen_text: Mutex::new(None),
            seen_screenshots: Mutex::new(false),
        }
    }

    fn seen_text(&self) -> Option<String> {
        self.seen_text.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerdictClassifier for RecordingClassifier {
    async fn classify(
        &self,
        text: &str,
        screenshots: Option<&ScreenshotPair>,
    ) -> Result<HarmfulVerdict, ClassifyError> {
        *self.seen_text.lock().unwrap() = Some(text.to_string());
        *self.seen_screenshots.lock().unwrap() = screenshots.is_some();
        self.verdict
            .clone()
            .map_err(|_| ClassifyError::Response("model unavailable".into()))
    }
}

fn screenshots() -> ScreenshotPair {
    ScreenshotPair {
        top: "data:image/png;base64,dG9w".to_string(),
        middle: "data:image/png;base64,bWlk".to_string(),
    }
}

fn checker(behavior: FetchBehavior, classifier: Arc<RecordingClassifier>) -> HarmfulChecker {
    HarmfulChecker::new(Arc::new(StubFetcher { behavior }), classifier)
}

// --- Tests ---

#[tokio::test]
async fn verdict_from_classifier_passes_through() {
    let expected = HarmfulVerdict {
        is_harmful: true,
        summary_harmful: "Online gambling landing page.".to_string(),
    };
    let classifier = Arc::new(RecordingClassifier::returning(expected.clone()));

    let capture = PageCapture {
        html: Some("url: http://bad.example\n<body>Place your bets</body>".to_string()),
        screenshots: Some(screenshots()),
    };
    let checker = checker(FetchBehavior::Capture(capture), classifier.clone());

    match checker.check("http://bad.example").await {
        CheckOutcome::Verdict(verdict) => assert_eq!(verdict, expected),
        other => panic!("expected verdict, got {:?}", other),
    }
    assert!(*classifier.seen_screenshots.lock().unwrap());
}

#[tokio::test]
async fn fetch_failure_is_reported_as_unavailable() {
    let classifier = Arc::new(RecordingClassifier::returning(HarmfulVerdict::default()));
    let checker = checker(FetchBehavior::NavigationError, classifier.clone());

    match checker.check("http://unreachable.example").await {
        CheckOutcome::Unavailable(UnavailableReason::Fetch(FetchError::Navigation(_))) => {}
        other => panic!("expected fetch failure, got {:?}", other),
    }
    // The classifier must never be consulted without page content.
    assert!(classifier.seen_text().is_none());
}

#[tokio::test]
async fn timeout_is_reported_as_unavailable() {
    let classifier = Arc::new(RecordingClassifier::returning(HarmfulVerdict::default()));
    let checker = checker(FetchBehavior::Timeout, classifier.clone());

    match checker.check("http://slow.example").await {
        CheckOutcome::Unavailable(UnavailableReason::Fetch(FetchError::Timeout(30))) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_capture_skips_classification() {
    let classifier = Arc::new(RecordingClassifier::returning(HarmfulVerdict::default()));
    let checker = checker(
        FetchBehavior::Capture(PageCapture::default()),
        classifier.clone(),
    );

    match checker.check("http://blank.example").await {
        CheckOutcome::Unavailable(UnavailableReason::EmptyPage) => {}
        other => panic!("expected empty-page outcome, got {:?}", other),
    }
    assert!(classifier.seen_text().is_none());
}

#[tokio::test]
async fn screenshots_without_html_use_placeholder_text() {
    let classifier = Arc::new(RecordingClassifier::returning(HarmfulVerdict::default()));
    let capture = PageCapture {
        html: None,
        screenshots: Some(screenshots()),
    };
    let checker = checker(FetchBehavior::Capture(capture), classifier.clone());

    match checker.check("http://images-only.example").await {
        CheckOutcome::Verdict(_) => {}
        other => panic!("expected verdict, got {:?}", other),
    }
    assert_eq!(
        classifier.seen_text().as_deref(),
        Some("No HTML content available.")
    );
}

#[tokio::test]
async fn classifier_receives_stripped_visible_text() {
    let classifier = Arc::new(RecordingClassifier::returning(HarmfulVerdict::default()));
    let capture = PageCapture {
        html: Some(
            "url: http://site.example\n<html><body><h1>Win</h1> <p>big {money}</p></body></html>"
                .to_string(),
        ),
        screenshots: None,
    };
    let checker = checker(FetchBehavior::Capture(capture), classifier.clone());

    match checker.check("http://site.example").await {
        CheckOutcome::Verdict(_) => {}
        other => panic!("expected verdict, got {:?}", other),
    }

    let seen = classifier.seen_text().unwrap();
    // Markup gone, whitespace collapsed, braces removed.
    assert!(seen.contains("Win big money"));
    assert!(!seen.contains('<'));
    assert!(!seen.contains('{'));
    // No screenshots were captured, so none may reach the model.
    assert!(!*classifier.seen_screenshots.lock().unwrap());
}

#[tokio::test]
async fn classifier_failure_is_reported_as_unavailable() {
    let classifier = Arc::new(RecordingClassifier::failing());
    let capture = PageCapture {
        html: Some("url: http://site.example\n<body>content</body>".to_string()),
        screenshots: None,
    };
    let checker = checker(FetchBehavior::Capture(capture), classifier);

    match checker.check("http://site.example").await {
        CheckOutcome::Unavailable(UnavailableReason::Classify(_)) => {}
        other => panic!("expected classify failure, got {:?}", other),
    }
}
