//! The bundle's virtual protocol (`app://bundle/...`).
//!
//! Pages are loaded through a registered scheme rather than `file://` so the
//! bundle behaves like a real web origin: root-absolute references such as
//! `/assets/app.js` resolve against the bundle root, `fetch()` works, and
//! relative URLs of sub-resources resolve the usual way.
//!
//! This module is engine independent. `servo_glue` adapts it to
//! Servo's protocol registry.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::{debug, warn};
use url::Url;

use crate::error::ResourceError;
use crate::navigation::virtual_path_from_url;
use crate::resolver::{BundleResolver, VirtualPath};

/// Characters escaped inside one path segment (WHATWG path-segment set).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// Privileges declared for the scheme when it is registered.
///
/// Registration has to happen before the windowing subsystem starts, since
/// the very first window already loads from this scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemePrivileges {
    /// Standard URL semantics: host, path, relative resolution, own origin.
    pub standard: bool,
    /// Treated as a secure context.
    pub secure: bool,
    /// Usable from `fetch()` / XHR.
    pub supports_fetch_api: bool,
    /// Responses carry CORS headers.
    pub cors_enabled: bool,
}

impl SchemePrivileges {
    pub const BUNDLE: Self = Self {
        standard: true,
        secure: true,
        supports_fetch_api: true,
        cors_enabled: true,
    };
}

/// Response produced for one protocol request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl ProtocolResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves the bundle under `scheme://host/`.
#[derive(Debug, Clone)]
pub struct BundleProtocol {
    scheme: String,
    host: String,
    privileges: SchemePrivileges,
    resolver: BundleResolver,
}

impl BundleProtocol {
    pub fn new(scheme: &str, host: &str, resolver: BundleResolver) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            privileges: SchemePrivileges::BUNDLE,
            resolver,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn privileges(&self) -> SchemePrivileges {
        self.privileges
    }

    pub fn resolver(&self) -> &BundleResolver {
        &self.resolver
    }

    /// Bundle origin, `scheme://host`.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// URL a window loads to display `path`. Each segment is
    /// percent-encoded, so decoding the URL gives `path` back.
    pub fn url_for(&self, path: &VirtualPath) -> Option<Url> {
        let mut url = Url::parse(&format!("{}/", self.origin())).ok()?;
        let encoded: Vec<String> = path
            .segments()
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect();
        url.set_path(&format!("/{}", encoded.join("/")));
        Some(url)
    }

    /// `true` for URLs of this bundle: same scheme and same host.
    pub fn handles(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
    }

    /// Where a directory URL missing its trailing `/` should be loaded from.
    ///
    /// Relative references inside `docs/index.html` only resolve under
    /// `docs/` when the document URL ends with a slash. Synchronous: used by
    /// the shell before letting a navigation proceed.
    pub fn directory_location(&self, url: &Url) -> Option<Url> {
        let path = self.slashless_directory_candidate(url)?;
        let resolved = self.resolver.resolve(&path).ok()?;
        std::fs::metadata(resolved)
            .is_ok_and(|m| m.is_dir())
            .then(|| with_trailing_slash(url))
    }

    fn slashless_directory_candidate(&self, url: &Url) -> Option<VirtualPath> {
        if !self.handles(url) || url.path().ends_with('/') {
            return None;
        }
        let path = virtual_path_from_url(url);
        (!path.is_empty()).then_some(path)
    }

    /// Serves one request. Never fails: errors become 3xx/4xx/5xx responses
    /// and only affect this request.
    pub async fn respond(&self, url: &Url) -> ProtocolResponse {
        if !self.handles(url) {
            return self.error_response(
                400,
                format!("not a {} URL: {url}", self.origin()),
            );
        }

        if let Some(path) = self.slashless_directory_candidate(url) {
            match self.resolver.is_directory(&path).await {
                Ok(true) => return self.redirect(with_trailing_slash(url)),
                Ok(false) => {}
                Err(err) => return self.failure(url, err),
            }
        }

        let path = virtual_path_from_url(url);
        match self.load(&path).await {
            Ok((served, content_type, body)) => {
                debug!(url = %url, path = %served, bytes = body.len(), "Served bundle resource");
                let mut headers = vec![
                    ("Content-Type", content_type),
                    ("Content-Length", body.len().to_string()),
                ];
                if self.privileges.cors_enabled {
                    headers.push(("Access-Control-Allow-Origin", "*".to_string()));
                }
                ProtocolResponse {
                    status: 200,
                    headers,
                    body,
                }
            }
            Err(err) => self.failure(url, err),
        }
    }

    fn failure(&self, url: &Url, err: ResourceError) -> ProtocolResponse {
        match &err {
            ResourceError::PathEscape(_) => {
                warn!(url = %url, "🚨 Blocked path traversal attempt")
            }
            ResourceError::NotFound(_) => debug!(url = %url, error = %err, "Not found"),
            ResourceError::Io { .. } => warn!(url = %url, error = %err, "Read failure"),
        }
        self.error_response(err.status(), err.to_string())
    }

    fn redirect(&self, location: Url) -> ProtocolResponse {
        debug!(location = %location, "Directory URL redirected");
        ProtocolResponse {
            status: 301,
            headers: vec![
                ("Location", location.to_string()),
                ("Content-Length", "0".to_string()),
            ],
            body: Vec::new(),
        }
    }

    async fn load(
        &self,
        path: &VirtualPath,
    ) -> Result<(VirtualPath, String, Vec<u8>), ResourceError> {
        let (served, stream) = self.resolver.open_page(path).await?;
        let content_type = stream.content_type().to_owned();
        let body = stream.read_to_end().await?;
        Ok((served, content_type, body))
    }

    fn error_response(&self, status: u16, message: String) -> ProtocolResponse {
        let body = message.into_bytes();
        ProtocolResponse {
            status,
            headers: vec![
                ("Content-Type", "text/plain; charset=utf-8".to_string()),
                ("Content-Length", body.len().to_string()),
            ],
            body,
        }
    }
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut location = url.clone();
    location.set_path(&format!("{}/", url.path()));
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn bundle() -> (TempDir, BundleProtocol) {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(root.join("docs/index.html"), "<h1>docs</h1>").unwrap();
        fs::write(root.join("assets/site.css"), "body{}").unwrap();

        let protocol = BundleProtocol::new(
            "app",
            "bundle",
            BundleResolver::new(root, "index.html"),
        );
        (dir, protocol)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_privileges_are_declared() {
        let (_dir, protocol) = bundle();
        let p = protocol.privileges();
        assert!(p.standard && p.secure && p.supports_fetch_api && p.cors_enabled);
    }

    #[test]
    fn test_url_for_virtual_path() {
        let (_dir, protocol) = bundle();
        assert_eq!(
            protocol.url_for(&VirtualPath::new("docs/index.html")).unwrap().as_str(),
            "app://bundle/docs/index.html"
        );
        assert_eq!(
            protocol.url_for(&VirtualPath::root()).unwrap().as_str(),
            "app://bundle/"
        );
    }

    #[test]
    fn test_url_for_encodes_spaces() {
        let (_dir, protocol) = bundle();
        let u = protocol.url_for(&VirtualPath::new("My Docs/a#1.html")).unwrap();
        assert_eq!(u.fragment(), None);
        assert_eq!(virtual_path_from_url(&u).as_str(), "My Docs/a#1.html");
    }

    #[tokio::test]
    async fn test_serves_root_absolute_asset() {
        let (_dir, protocol) = bundle();
        let resp = protocol.respond(&url("app://bundle/assets/site.css")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"body{}");
        assert_eq!(resp.header("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(resp.header("Content-Length"), Some("6"));
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn test_url_for_round_trips_literal_percent() {
        let (_dir, protocol) = bundle();
        for raw in ["a%20b.html", "100%.html", "x?y/z.html", "café/{v}.html"] {
            let path = VirtualPath::new(raw);
            let u = protocol.url_for(&path).unwrap();
            assert_eq!(virtual_path_from_url(&u), path, "{u}");
        }
    }

    #[tokio::test]
    async fn test_directory_request_serves_index() {
        let (_dir, protocol) = bundle();
        let resp = protocol.respond(&url("app://bundle/docs/")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"<h1>docs</h1>");

        let resp = protocol.respond(&url("app://bundle/")).await;
        assert_eq!(resp.body, b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_directory_without_slash_redirects() {
        let (dir, protocol) = bundle();
        fs::write(dir.path().join("docs/style.css"), "h1{}").unwrap();

        let resp = protocol.respond(&url("app://bundle/docs?tab=2")).await;
        assert_eq!(resp.status, 301);
        let location = url(resp.header("Location").unwrap());
        assert_eq!(location.as_str(), "app://bundle/docs/?tab=2");

        // Relative sub-resources now resolve inside the directory.
        let css = protocol.respond(&location.join("style.css").unwrap()).await;
        assert_eq!(css.status, 200);
        assert_eq!(css.body, b"h1{}");
    }

    #[test]
    fn test_directory_location_for_navigation() {
        let (_dir, protocol) = bundle();
        assert_eq!(
            protocol.directory_location(&url("app://bundle/docs")),
            Some(url("app://bundle/docs/"))
        );
        assert_eq!(protocol.directory_location(&url("app://bundle/docs/")), None);
        assert_eq!(
            protocol.directory_location(&url("app://bundle/assets/site.css")),
            None
        );
        assert_eq!(protocol.directory_location(&url("app://bundle")), None);
        assert_eq!(protocol.directory_location(&url("https://bundle/docs")), None);
    }

    #[tokio::test]
    async fn test_other_host_is_400() {
        let (_dir, protocol) = bundle();
        assert!(protocol.handles(&url("app://BUNDLE/index.html")));
        let resp = protocol.respond(&url("app://elsewhere/index.html")).await;
        assert_eq!(resp.status, 400);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_500() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, protocol) = bundle();
        let locked = dir.path().join("assets/locked.css");
        fs::write(&locked, "body{}").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            // Privileged user: permission bits are not enforced.
            return;
        }

        let resp = protocol.respond(&url("app://bundle/assets/locked.css")).await;
        assert_eq!(resp.status, 500);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let (_dir, protocol) = bundle();
        let resp = protocol.respond(&url("app://bundle/nope.html")).await;
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_encoded_traversal_is_403() {
        let (_dir, protocol) = bundle();
        let resp = protocol
            .respond(&url("app://bundle/..%5C..%5Cetc%5Cpasswd"))
            .await;
        assert_eq!(resp.status, 403);
    }

    #[tokio::test]
    async fn test_foreign_scheme_is_400() {
        let (_dir, protocol) = bundle();
        let resp = protocol.respond(&url("https://example.com/index.html")).await;
        assert_eq!(resp.status, 400);
    }
}
