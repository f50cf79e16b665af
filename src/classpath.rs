//! Classpath elements and resource URLs.
//!
//! Package scans go through a [`ResourceLoader`], which answers "which
//! locations provide this package directory" with resource URLs in the form a
//! JVM class loader would hand out (`file:`, `jar:file:...!/`, and the
//! `vfs*:` schemes used by some application servers). [`root_for_resource`]
//! maps each URL back to the directory or archive that has to be scanned.

use memmap2::Mmap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::scan::{Root, Sources, looks_like_archive};

pub trait ResourceLoader {
    /// URLs of every location providing `name`, e.g. `com/example/`.
    fn resources(&self, name: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
    elements: Vec<PathBuf>,
}

impl Classpath {
    pub fn new(elements: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    /// Splits a platform path list (`:` on Unix, `;` on Windows).
    pub fn parse(value: &OsStr) -> Self {
        Self::new(std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()))
    }

    pub fn from_env() -> Self {
        match std::env::var_os("CLASSPATH") {
            Some(value) => Self::parse(&value),
            None => Self::default(),
        }
    }

    pub fn elements(&self) -> &[PathBuf] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Every element that exists, unfiltered.
    pub fn sources(&self) -> Result<Sources> {
        let mut roots = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            match Root::from_path(element) {
                Ok(root) => roots.push(root),
                Err(Error::SourceNotFound { path }) => {
                    warn!(path = %path.display(), "classpath element does not exist");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Sources::from_roots(roots, None))
    }
}

impl ResourceLoader for Classpath {
    fn resources(&self, name: &str) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for element in &self.elements {
            if element.is_dir() {
                let candidate = element.join(name.trim_end_matches('/'));
                if candidate.is_dir() {
                    urls.push(file_url(&candidate, true));
                }
                continue;
            }
            if !element.is_file() {
                debug!(path = %element.display(), "skipping missing classpath element");
                continue;
            }
            match archive_provides(element, name) {
                Ok(true) => urls.push(format!("jar:{}!/{}", file_url(element, false), name)),
                Ok(false) => {}
                Err(e) => warn!(path = %element.display(), error = %e, "skipping classpath element"),
            }
        }
        Ok(urls)
    }
}

fn archive_provides(path: &Path, prefix: &str) -> Result<bool> {
    if !looks_like_archive(path)? {
        return Ok(false);
    }
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    // SAFETY: read-only map, dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
    let zip = ZipArchive::new(Cursor::new(&mmap[..])).map_err(|source| Error::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    let found = zip.file_names().any(|n| n.starts_with(prefix));
    Ok(found)
}

/// Maps a resource URL to the root that has to be scanned for it.
///
/// Returns `Ok(None)` for a `vfs*:` resource with no enclosing archive on disk.
pub fn root_for_resource(url: &str) -> Result<Option<Root>> {
    let Some((scheme, rest)) = url.split_once(':') else {
        return Err(Error::unrecognized_resource(url));
    };
    let scheme = scheme.to_ascii_lowercase();

    if scheme == "jar" {
        let archive_url = rest.split_once("!/").map_or(rest, |(archive, _)| archive);
        let Some(path) = archive_url.strip_prefix("file:").and_then(url_path) else {
            return Err(Error::unrecognized_resource(url));
        };
        if !path.is_file() {
            return Err(Error::unrecognized_resource(url));
        }
        return Ok(Some(Root::Archive(canonical(&path)?)));
    }

    let is_vfs = scheme.starts_with("vfs");
    if scheme != "file" && !is_vfs {
        return Err(Error::unrecognized_resource(url));
    }
    let Some(path) = url_path(rest) else {
        return Err(Error::unrecognized_resource(url));
    };

    if path.is_dir() {
        return Ok(Some(Root::Directory(canonical(&path)?)));
    }
    if !is_vfs {
        return Err(Error::unrecognized_resource(url));
    }

    // archive boundary
    match path.ancestors().find(|p| p.is_file()) {
        Some(archive) => Ok(Some(Root::Archive(canonical(archive)?))),
        None => {
            debug!(%url, "no archive encloses resource");
            Ok(None)
        }
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::io(path, e),
    })
}

// Path part of a hierarchical URL, after the scheme. Accepts `/p`, `//host/p`
// with an empty or `localhost` host, and strips any query or fragment.
fn url_path(rest: &str) -> Option<PathBuf> {
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let path = match rest.strip_prefix("//") {
        Some(authority_and_path) => {
            let slash = authority_and_path.find('/')?;
            let host = &authority_and_path[..slash];
            if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
                return None;
            }
            &authority_and_path[slash..]
        }
        None => rest,
    };
    if !path.starts_with('/') {
        return None;
    }
    let decoded = percent_decode(path);
    if cfg!(windows) && decoded.as_bytes().get(2) == Some(&b':') {
        return Some(PathBuf::from(&decoded[1..]));
    }
    Some(PathBuf::from(decoded))
}

pub fn file_url(path: &Path, directory: bool) -> String {
    let mut text = path.to_string_lossy().replace('\\', "/");
    if !text.starts_with('/') {
        text.insert(0, '/');
    }
    if directory && !text.ends_with('/') {
        text.push('/');
    }
    format!("file:{}", percent_encode(&text))
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'.' | b'_' | b'~' | b':') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = text.get(i + 1..i + 3)
            && let Ok(b) = u8::from_str_radix(hex, 16)
        {
            out.push(b);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
