//! Resource resolver: virtual path → file on disk → bytes.
//!
//! ```text
//!  app://bundle/docs/guide      (URL, handled by `navigation` / `protocol`)
//!          │
//!          ▼
//!  VirtualPath "docs/guide"     (normalized, root-relative)
//!          │ ensure_document
//!          ▼
//!  "docs/guide/index.html"
//!          │ resolve(base, ..)   PathEscape guard
//!          ▼
//!  <base>/docs/guide/index.html
//!          │ fetch_bytes (tokio::fs)
//!          ▼
//!  ResourceStream { content_type, len, file }
//! ```
//!
//! The base directory depends on the [`RuntimeMode`]: packaging relocates
//! the bundle into the installed resources directory, while a development
//! build reads it straight from the project.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::content_type::content_type_for;
use crate::error::ResourceError;
use crate::mode::{RuntimeMode, cargo_project_root};

/// Size of the chunks handed out by [`ResourceStream::next_chunk`].
const CHUNK_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// VirtualPath
// ─────────────────────────────────────────────────────────────────────────────

/// Root-relative, slash-separated path to a resource inside the bundle.
///
/// Construction never fails. It converts backslashes, drops a leading Windows
/// drive segment (`/C:/...` is what a Windows path looks like after a trip
/// through a URL), strips leading separators and removes empty and `.`
/// segments. `..` segments are kept as-is: whether they escape the bundle is
/// decided by [`resolve`], against a concrete base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn new(raw: &str) -> Self {
        let unified = raw.replace('\\', "/");
        let mut segments: Vec<&str> = unified
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        if segments.first().is_some_and(|s| is_drive_segment(s)) {
            segments.remove(0);
        }

        Self(segments.join("/"))
    }

    /// The bundle root itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// `true` when the last segment names an HTML document.
    pub fn is_document(&self) -> bool {
        self.segments().last().is_some_and(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".html") || lower.ends_with(".htm") || lower.ends_with(".xhtml")
        })
    }

    /// Appends one or more segments.
    pub fn join(&self, tail: &str) -> Self {
        if self.is_empty() {
            Self::new(tail)
        } else {
            Self::new(&format!("{}/{}", self.0, tail))
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn is_drive_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

// ─────────────────────────────────────────────────────────────────────────────
// Path computation
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the bundle root for `mode`, given the running executable.
///
/// - Packaged: `<installed resources>/<site_dir>`. Inside a macOS app bundle
///   that is `Contents/Resources`, everywhere else `<exe_dir>/resources`.
/// - Development: `<program location>/<site_dir>`, where the program location
///   is the cargo project root when running from `target/<profile>/`.
pub fn base_path(mode: RuntimeMode, exe: &Path, site_dir: &str) -> PathBuf {
    let exe_dir = exe.parent().unwrap_or(exe);
    match mode {
        RuntimeMode::Packaged => installed_resources_dir(exe_dir).join(site_dir),
        RuntimeMode::Development => cargo_project_root(exe_dir)
            .unwrap_or(exe_dir)
            .join(site_dir),
    }
}

fn installed_resources_dir(exe_dir: &Path) -> PathBuf {
    if exe_dir.ends_with("Contents/MacOS")
        && let Some(contents) = exe_dir.parent()
    {
        return contents.join("Resources");
    }
    exe_dir.join("resources")
}

/// Joins `path` onto `base` segment by segment.
///
/// `..` pops the previous segment; popping past `base`, or any intermediate
/// result that leaves `base` (a segment the OS reads as absolute or as a
/// drive prefix), is a [`ResourceError::PathEscape`].
pub fn resolve(base: &Path, path: &VirtualPath) -> Result<PathBuf, ResourceError> {
    let escape = || ResourceError::PathEscape(path.to_string());

    let mut resolved = base.to_path_buf();
    let mut depth = 0usize;

    for segment in path.segments() {
        if segment == ".." {
            if depth == 0 {
                return Err(escape());
            }
            resolved.pop();
            depth -= 1;
            continue;
        }

        resolved.push(segment);
        depth += 1;
        if !resolved.starts_with(base) {
            return Err(escape());
        }
    }

    if !resolved.starts_with(base) {
        return Err(escape());
    }
    Ok(resolved)
}

/// Appends `index_document` unless `path` already names an HTML document.
///
/// Realizes the "a directory means its index file" convention of static-site
/// bundlers. Idempotent.
pub fn ensure_document(path: &VirtualPath, index_document: &str) -> VirtualPath {
    if path.is_document() {
        path.clone()
    } else {
        path.join(index_document)
    }
}

/// Opens `path` read-only and reports its size and content type.
pub async fn fetch_bytes(path: &Path) -> Result<ResourceStream, ResourceError> {
    let metadata = match fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ResourceError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(ResourceError::io(path, e)),
    };

    if !metadata.is_file() {
        return Err(ResourceError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ResourceError::NotFound(path.to_path_buf()),
        _ => ResourceError::io(path, e),
    })?;

    Ok(ResourceStream {
        path: path.to_path_buf(),
        file,
        len: metadata.len(),
        read: 0,
        content_type: content_type_for(path),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceStream
// ─────────────────────────────────────────────────────────────────────────────

/// An opened bundle file.
#[derive(Debug)]
pub struct ResourceStream {
    path: PathBuf,
    file: File,
    len: u64,
    read: u64,
    content_type: String,
}

impl ResourceStream {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file when it was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Reads the next chunk, `None` at end of file.
    ///
    /// A file that ends before the size recorded at open time is reported as
    /// truncated.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ResourceError> {
        let mut buf = vec![0; CHUNK_SIZE];
        let n = self
            .file
            .read(&mut buf)
            .await
            .map_err(|e| ResourceError::io(&self.path, e))?;

        if n == 0 {
            if self.read < self.len {
                return Err(self.truncated());
            }
            return Ok(None);
        }

        buf.truncate(n);
        self.read += n as u64;
        Ok(Some(buf))
    }

    /// Reads the remaining contents into memory.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, ResourceError> {
        let mut bytes = Vec::with_capacity(self.len as usize);
        self.file
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ResourceError::io(&self.path, e))?;

        self.read += bytes.len() as u64;
        if self.read < self.len {
            return Err(self.truncated());
        }
        Ok(bytes)
    }

    fn truncated(&self) -> ResourceError {
        ResourceError::io(
            &self.path,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file truncated: read {} of {} bytes", self.read, self.len),
            ),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BundleResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Resolver bound to one bundle root and default document.
///
/// Holds no mutable state, so a single instance can be shared by every
/// window and every concurrent fetch.
#[derive(Debug, Clone)]
pub struct BundleResolver {
    base: PathBuf,
    index_document: String,
}

impl BundleResolver {
    pub fn new(base: impl Into<PathBuf>, index_document: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            index_document: index_document.into(),
        }
    }

    /// Builds the resolver for the running executable.
    pub fn for_mode(mode: RuntimeMode, site_dir: &str, index_document: &str) -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        let base = base_path(mode, &exe, site_dir);
        debug!(?mode, base = %base.display(), "Bundle root");
        if !base.is_dir() {
            warn!(base = %base.display(), "Bundle root does not exist yet");
        }
        Ok(Self::new(base, index_document))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn index_document(&self) -> &str {
        &self.index_document
    }

    pub fn resolve(&self, path: &VirtualPath) -> Result<PathBuf, ResourceError> {
        resolve(&self.base, path)
    }

    pub fn ensure_document(&self, path: &VirtualPath) -> VirtualPath {
        ensure_document(path, &self.index_document)
    }

    /// Resolves and opens `path`.
    ///
    /// When the file exists, its canonical location must still be under the
    /// canonical bundle root: a symlink pointing out of the bundle is a
    /// [`ResourceError::PathEscape`] just like a `..` segment.
    pub async fn open(&self, path: &VirtualPath) -> Result<ResourceStream, ResourceError> {
        let resolved = self.resolve(path)?;

        if let (Ok(real), Ok(real_base)) = (
            fs::canonicalize(&resolved).await,
            fs::canonicalize(&self.base).await,
        ) && !real.starts_with(&real_base)
        {
            warn!(
                path = %path,
                target = %real.display(),
                "Blocked bundle path leaving the root through a link"
            );
            return Err(ResourceError::PathEscape(path.to_string()));
        }

        fetch_bytes(&resolved).await
    }

    /// Like [`open`](Self::open), but a path naming the root or an existing
    /// directory is served through its default document.
    ///
    /// Returns the virtual path that was actually opened.
    pub async fn open_page(
        &self,
        path: &VirtualPath,
    ) -> Result<(VirtualPath, ResourceStream), ResourceError> {
        let target = if path.is_empty() || self.is_directory(path).await? {
            path.join(&self.index_document)
        } else {
            path.clone()
        };
        let stream = self.open(&target).await?;
        Ok((target, stream))
    }

    /// `true` when `path` names an existing directory inside the bundle.
    pub async fn is_directory(&self, path: &VirtualPath) -> Result<bool, ResourceError> {
        let resolved = self.resolve(path)?;
        Ok(fs::metadata(&resolved).await.is_ok_and(|m| m.is_dir()))
    }
}
