//! Navigation interceptor: decides what happens to every request for a new
//! browsing context.
//!
//! ## State machine (one pass per request, nothing kept between requests)
//!
//! ```text
//! Received ──► Filtered ──(not a new context / no URL)──► Allowed
//!                 │
//!                 ▼
//!             Classified ──(own scheme)──► ensure_document ──► create_window ──► Redirected
//!                 │
//!                 └──────(anything else)──► open_external ───────────────────► Delegated
//! ```
//!
//! Classification and path extraction are pure and cannot fail. The only
//! fallible step, reading the bundle, happens later inside the new window,
//! where a failure is just a failed load.

use percent_encoding::percent_decode_str;
use tracing::info;
use url::Url;

use crate::resolver::{VirtualPath, ensure_document};

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Creates managed windows. The window starts loading `path` through the
/// bundle protocol; the interceptor keeps no handle to it.
pub trait WindowManager {
    fn create_window(&self, path: &VirtualPath);
}

/// Hands a URL to the operating system's default handler. Fire and forget.
pub trait ExternalOpener {
    fn open_external(&self, url: &str);
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / outcome types
// ─────────────────────────────────────────────────────────────────────────────

/// Browsing-context intent of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `window.open()` or a link with `target="_blank"` opening a window.
    NewWindow,
    /// A new tab brought to the front.
    ForegroundTab,
    /// A new tab left in the background.
    BackgroundTab,
    /// Plain same-window navigation.
    CurrentTab,
    Other,
}

impl Disposition {
    /// Only these dispositions are intercepted.
    pub fn opens_new_context(self) -> bool {
        matches!(self, Self::NewWindow | Self::ForegroundTab)
    }
}

/// One navigation attempt, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: Option<String>,
    pub disposition: Disposition,
}

impl NavigationRequest {
    pub fn new(url: impl Into<String>, disposition: Disposition) -> Self {
        Self {
            url: Some(url.into()),
            disposition,
        }
    }
}

/// Internal (bundle) vs. external (open web) target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Internal(VirtualPath),
    /// The URL exactly as received.
    External(String),
}

/// Terminal state of the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not ours to handle: the engine proceeds with its default behaviour.
    Allowed,
    /// Vetoed; a managed window was requested for this document.
    Redirected(VirtualPath),
    /// Vetoed; the URL went to the OS default handler.
    Delegated(String),
}

impl Outcome {
    /// `true` when the original navigation must be cancelled.
    pub fn is_vetoed(&self) -> bool {
        !matches!(self, Self::Allowed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interceptor
// ─────────────────────────────────────────────────────────────────────────────

/// Gatekeeper for new-browsing-context requests.
///
/// Stateless across requests: the same instance serves every window.
#[derive(Debug, Clone)]
pub struct NavigationInterceptor {
    scheme: String,
    index_document: String,
}

impl NavigationInterceptor {
    pub fn new(scheme: &str, index_document: &str) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            index_document: index_document.to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Runs the state machine for one request.
    pub fn handle(
        &self,
        request: &NavigationRequest,
        windows: &dyn WindowManager,
        opener: &dyn ExternalOpener,
    ) -> Outcome {
        if !request.disposition.opens_new_context() {
            return Outcome::Allowed;
        }
        let Some(url) = request.url.as_deref().filter(|u| !u.is_empty()) else {
            return Outcome::Allowed;
        };

        match self.classify(url) {
            Classification::Internal(path) => {
                let document = ensure_document(&path, &self.index_document);
                info!(path = %document, "Opening internal URL in new window");
                windows.create_window(&document);
                Outcome::Redirected(document)
            }
            Classification::External(url) => {
                info!(url, "Opening external URL in default browser");
                opener.open_external(&url);
                Outcome::Delegated(url)
            }
        }
    }

    /// Internal iff the URL's scheme is the shell's own scheme.
    /// Anything unparseable is treated as external and forwarded verbatim.
    pub fn classify(&self, url: &str) -> Classification {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == self.scheme => {
                Classification::Internal(virtual_path_from_url(&parsed))
            }
            _ => Classification::External(url.to_string()),
        }
    }
}

/// Extracts the bundle path from an internal URL: the percent-decoded path
/// component, without scheme, host, query or fragment, and without leading
/// separators.
pub fn virtual_path_from_url(url: &Url) -> VirtualPath {
    let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
    VirtualPath::new(&decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingWindows(RefCell<Vec<String>>);

    impl WindowManager for RecordingWindows {
        fn create_window(&self, path: &VirtualPath) {
            self.0.borrow_mut().push(path.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingOpener(RefCell<Vec<String>>);

    impl ExternalOpener for RecordingOpener {
        fn open_external(&self, url: &str) {
            self.0.borrow_mut().push(url.to_string());
        }
    }

    fn interceptor() -> NavigationInterceptor {
        NavigationInterceptor::new("app", "index.html")
    }

    fn run(request: NavigationRequest) -> (Outcome, Vec<String>, Vec<String>) {
        let windows = RecordingWindows::default();
        let opener = RecordingOpener::default();
        let outcome = interceptor().handle(&request, &windows, &opener);
        (outcome, windows.0.into_inner(), opener.0.into_inner())
    }

    #[test]
    fn test_internal_directory_opens_window_with_index() {
        let (outcome, windows, opened) = run(NavigationRequest::new(
            "app://bundle/assets/report",
            Disposition::ForegroundTab,
        ));
        assert_eq!(
            outcome,
            Outcome::Redirected(VirtualPath::new("assets/report/index.html"))
        );
        assert!(outcome.is_vetoed());
        assert_eq!(windows, vec!["assets/report/index.html"]);
        assert!(opened.is_empty());
    }

    #[test]
    fn test_classify_extracts_virtual_path() {
        assert_eq!(
            interceptor().classify("app://bundle/assets/report"),
            Classification::Internal(VirtualPath::new("assets/report"))
        );
    }

    #[test]
    fn test_internal_document_kept_as_is() {
        let (_, windows, _) = run(NavigationRequest::new(
            "app://bundle/docs/page.html?x=1#top",
            Disposition::NewWindow,
        ));
        assert_eq!(windows, vec!["docs/page.html"]);
    }

    #[test]
    fn test_internal_root_yields_default_document() {
        for url in ["app://bundle", "app://bundle/", "app://bundle//"] {
            let (outcome, windows, _) = run(NavigationRequest::new(url, Disposition::NewWindow));
            assert_eq!(outcome, Outcome::Redirected(VirtualPath::new("index.html")));
            assert_eq!(windows, vec!["index.html"], "url: {url}");
        }
    }

    #[test]
    fn test_internal_path_is_percent_decoded() {
        assert_eq!(
            interceptor().classify("app://bundle/My%20Docs/caf%C3%A9.html"),
            Classification::Internal(VirtualPath::new("My Docs/café.html"))
        );
    }

    #[test]
    fn test_internal_windows_drive_is_stripped() {
        assert_eq!(
            interceptor().classify("app://bundle/C:/docs/page.html"),
            Classification::Internal(VirtualPath::new("docs/page.html"))
        );
    }

    #[test]
    fn test_scheme_match_is_case_insensitive() {
        let upper = NavigationInterceptor::new("APP", "index.html");
        assert!(matches!(
            upper.classify("App://bundle/x.html"),
            Classification::Internal(_)
        ));
    }

    #[test]
    fn test_external_is_delegated_verbatim() {
        let (outcome, windows, opened) = run(NavigationRequest::new(
            "https://example.com/x",
            Disposition::ForegroundTab,
        ));
        assert_eq!(outcome, Outcome::Delegated("https://example.com/x".into()));
        assert!(outcome.is_vetoed());
        assert!(windows.is_empty());
        assert_eq!(opened, vec!["https://example.com/x"]);
    }

    #[test]
    fn test_file_and_mailto_are_external() {
        for url in ["file:///etc/hosts", "mailto:someone@example.com"] {
            assert_eq!(
                interceptor().classify(url),
                Classification::External(url.to_string())
            );
        }
    }

    #[test]
    fn test_unparseable_url_is_external() {
        assert_eq!(
            interceptor().classify("not a url"),
            Classification::External("not a url".into())
        );
    }

    #[test]
    fn test_same_context_is_never_classified() {
        for disposition in [
            Disposition::CurrentTab,
            Disposition::BackgroundTab,
            Disposition::Other,
        ] {
            let (outcome, windows, opened) = run(NavigationRequest::new(
                "https://example.com/x",
                disposition,
            ));
            assert_eq!(outcome, Outcome::Allowed);
            assert!(!outcome.is_vetoed());
            assert!(windows.is_empty());
            assert!(opened.is_empty());
        }
    }

    #[test]
    fn test_missing_url_is_allowed() {
        let (outcome, windows, opened) = run(NavigationRequest {
            url: None,
            disposition: Disposition::NewWindow,
        });
        assert_eq!(outcome, Outcome::Allowed);
        assert!(windows.is_empty() && opened.is_empty());

        let (outcome, _, _) = run(NavigationRequest::new("", Disposition::NewWindow));
        assert_eq!(outcome, Outcome::Allowed);
    }
}
