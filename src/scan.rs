//! Discovery of class file candidates.
//!
//! A [`Sources`] value is the resolved form of a scan request: a deduplicated
//! set of roots (directories, archives, single files) plus an optional set of
//! package prefixes that archive members must match. [`Sources::entries`]
//! then pulls candidate entries one at a time:
//!
//! - directories are walked recursively in file-name order; `.class` files
//!   are yielded and archives found on the way are opened;
//! - archives are memory-mapped and their `.class` members yielded in name
//!   order; archive members (`.jar`, `.zip`, `.war`, `.ear`) are read into
//!   memory and iterated one level down.
//!
//! An archive member borrows the enumerator and is released before the next
//! pull. A loose file entry owns its handle, which closes when the consumer
//! drops it.

use ignore::{Walk, WalkBuilder};
use memmap2::Mmap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;
use zip::read::ZipFile;

use crate::classpath::{ResourceLoader, root_for_resource};
use crate::error::{Error, Result};

const ARCHIVE_EXTENSIONS: [&str; 4] = ["jar", "zip", "war", "ear"];
const ZIP_SIGNATURES: [[u8; 4]; 2] = [*b"PK\x03\x04", *b"PK\x05\x06"];
// upper bound on the buffer reserved up front for a nested archive
const NESTED_RESERVE_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Root {
    Directory(PathBuf),
    Archive(PathBuf),
    /// A single file scanned as-is.
    File(PathBuf),
}

impl Root {
    /// Classifies an existing path. The path is canonicalized so that one
    /// location reached through different spellings compares equal.
    pub fn from_path(path: &Path) -> Result<Self> {
        let canonical = std::fs::canonicalize(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::io(path, e),
        })?;
        let metadata = std::fs::metadata(&canonical).map_err(|e| Error::io(&canonical, e))?;

        if metadata.is_dir() {
            Ok(Root::Directory(canonical))
        } else if looks_like_archive(&canonical)? {
            Ok(Root::Archive(canonical))
        } else {
            Ok(Root::File(canonical))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Root::Directory(p) | Root::Archive(p) | Root::File(p) => p,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Root::Archive(_))
    }

    /// True when walking `dir` would already yield this root.
    fn is_within(&self, dir: &Path) -> bool {
        let path = self.path();
        if path == dir || !path.starts_with(dir) {
            return false;
        }
        match self {
            Root::Directory(_) => true,
            Root::Archive(p) => has_extension(p, &ARCHIVE_EXTENSIONS),
            Root::File(p) => has_extension(p, &["class"]),
        }
    }
}

// Drops roots that a directory root already covers.
fn outermost(roots: BTreeSet<Root>) -> BTreeSet<Root> {
    let dirs: Vec<PathBuf> = roots
        .iter()
        .filter_map(|r| match r {
            Root::Directory(p) => Some(p.clone()),
            _ => None,
        })
        .collect();
    roots
        .into_iter()
        .filter(|root| match dirs.iter().find(|d| root.is_within(d)) {
            Some(dir) => {
                debug!(root = %root.path().display(), within = %dir.display(), "dropping nested root");
                false
            }
            None => true,
        })
        .collect()
}

/// True when the file starts with a zip signature.
pub fn looks_like_archive(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(ZIP_SIGNATURES.contains(&magic)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// `com.example` becomes `com/example/`.
pub fn package_prefix(package: &str) -> String {
    let mut prefix = package.trim().replace('.', "/");
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    roots: BTreeSet<Root>,
    prefixes: Option<Vec<String>>,
}

impl Sources {
    pub fn from_roots(roots: impl IntoIterator<Item = Root>, prefixes: Option<Vec<String>>) -> Self {
        let prefixes = prefixes.map(|p| {
            let unique: BTreeSet<String> = p.into_iter().collect();
            unique.into_iter().collect()
        });
        Self {
            roots: outermost(roots.into_iter().collect()),
            prefixes,
        }
    }

    /// Every path must exist; nothing is filtered by package.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let roots = paths
            .iter()
            .map(|p| Root::from_path(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_roots(roots, None))
    }

    /// Resolves dotted package names through `loader`. Archive members outside
    /// the packages are filtered out.
    pub fn from_packages<L, S>(loader: &L, packages: &[S]) -> Result<Self>
    where
        L: ResourceLoader + ?Sized,
        S: AsRef<str>,
    {
        let prefixes: BTreeSet<String> = packages
            .iter()
            .map(|p| package_prefix(p.as_ref()))
            .collect();

        let mut roots = BTreeSet::new();
        for prefix in &prefixes {
            for url in loader.resources(prefix)? {
                if let Some(root) = root_for_resource(&url)? {
                    debug!(%url, root = %root.path().display(), "resolved package resource");
                    roots.insert(root);
                } else {
                    debug!(%url, "ignoring resource outside any archive");
                }
            }
        }

        Ok(Self::from_roots(roots, Some(prefixes.into_iter().collect())))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Root> {
        self.roots.iter()
    }

    pub fn prefixes(&self) -> Option<&[String]> {
        self.prefixes.as_deref()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// One `Sources` per root, sharing the package filter.
    pub fn split(&self) -> Vec<Sources> {
        self.roots
            .iter()
            .map(|root| Sources {
                roots: BTreeSet::from([root.clone()]),
                prefixes: self.prefixes.clone(),
            })
            .collect()
    }

    pub fn entries(&self) -> Entries<'_> {
        Entries {
            roots: self.roots.iter(),
            prefixes: self.prefixes.as_deref(),
            walk: None,
            archive: None,
            nested: None,
        }
    }
}

/// A readable class file candidate.
pub struct Entry<'a> {
    name: String,
    reader: EntryReader<'a>,
}

enum EntryReader<'a> {
    File(File),
    Archived(ZipFile<'a>),
}

impl Entry<'_> {
    /// File path, or `archive!/member` for archive members.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for loose files, false for archive members.
    pub fn is_file(&self) -> bool {
        matches!(self.reader, EntryReader::File(_))
    }
}

impl Read for Entry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.reader {
            EntryReader::File(f) => f.read(buf),
            EntryReader::Archived(z) => z.read(buf),
        }
    }
}

/// Pull-based, single-pass sequence of entries. Not an `Iterator` because
/// archive members borrow the open archive.
pub struct Entries<'s> {
    roots: std::collections::btree_set::Iter<'s, Root>,
    prefixes: Option<&'s [String]>,
    walk: Option<(PathBuf, Walk)>,
    archive: Option<OpenArchive>,
    nested: Option<OpenArchive>,
}

impl Entries<'_> {
    pub fn next_entry(&mut self) -> Option<Result<Entry<'_>>> {
        loop {
            if let Some(member) = self.nested.as_mut().and_then(|a| a.pending.next()) {
                return self.nested.as_mut().map(|a| a.entry(&member));
            }
            self.nested = None;

            if let Some(member) = self.archive.as_mut().and_then(|a| a.pending.next()) {
                if !member.nested {
                    return self.archive.as_mut().map(|a| a.entry(&member));
                }
                let prefixes = self.prefixes;
                match self.archive.as_mut().map(|a| a.open_nested(&member, prefixes)) {
                    Some(Ok(nested)) => self.nested = Some(nested),
                    Some(Err(e)) => return Some(Err(e)),
                    None => {}
                }
                continue;
            }
            self.archive = None;

            if let Some((dir, walk)) = self.walk.as_mut() {
                match walk.next() {
                    Some(Ok(dent)) => {
                        if !dent.file_type().is_some_and(|t| t.is_file()) {
                            continue;
                        }
                        let path = dent.into_path();
                        if has_extension(&path, &["class"]) {
                            return Some(open_file(path));
                        }
                        if has_extension(&path, &ARCHIVE_EXTENSIONS) {
                            match OpenArchive::open(&path, self.prefixes) {
                                Ok(archive) => self.archive = Some(archive),
                                Err(e) => return Some(Err(Error::unreadable_archive(path, e))),
                            }
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some(Err(Error::Walk {
                            path: dir.clone(),
                            source: e,
                        }));
                    }
                    None => self.walk = None,
                }
                continue;
            }

            match self.roots.next()? {
                Root::Directory(dir) => self.walk = Some((dir.clone(), walker(dir))),
                Root::Archive(path) => match OpenArchive::open(path, self.prefixes) {
                    Ok(archive) => self.archive = Some(archive),
                    Err(e) => return Some(Err(e)),
                },
                Root::File(path) => return Some(open_file(path.clone())),
            }
        }
    }
}

fn walker(dir: &Path) -> Walk {
    WalkBuilder::new(dir)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn open_file<'a>(path: PathBuf) -> Result<Entry<'a>> {
    let name = path.to_string_lossy().to_string();
    match File::open(&path) {
        Ok(file) => Ok(Entry {
            name,
            reader: EntryReader::File(file),
        }),
        Err(e) => Err(Error::entry_read(name, e)),
    }
}

fn matches_prefix(name: &str, prefixes: Option<&[String]>) -> bool {
    match prefixes {
        Some(prefixes) => prefixes.iter().any(|p| name.starts_with(p.as_str())),
        None => true,
    }
}

enum ArchiveData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for ArchiveData {
    fn as_ref(&self) -> &[u8] {
        match self {
            ArchiveData::Mapped(m) => &m[..],
            ArchiveData::Owned(v) => v.as_slice(),
        }
    }
}

struct Member {
    name: String,
    nested: bool,
}

struct OpenArchive {
    name: String,
    zip: ZipArchive<Cursor<ArchiveData>>,
    pending: std::vec::IntoIter<Member>,
}

impl OpenArchive {
    fn open(path: &Path, prefixes: Option<&[String]>) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        // SAFETY: The file is opened read-only and the map is owned by the archive,
        // which is dropped before any other use of the path by this scan.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
        let zip = ZipArchive::new(Cursor::new(ArchiveData::Mapped(mmap))).map_err(|source| {
            Error::Archive {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self::index(path.to_string_lossy().to_string(), zip, prefixes, true))
    }

    fn index(
        name: String,
        zip: ZipArchive<Cursor<ArchiveData>>,
        prefixes: Option<&[String]>,
        allow_nested: bool,
    ) -> Self {
        let mut names: Vec<&str> = zip.file_names().collect();
        names.sort_unstable();

        let pending: Vec<Member> = names
            .into_iter()
            .filter_map(|n| {
                let path = Path::new(n);
                if has_extension(path, &["class"]) && matches_prefix(n, prefixes) {
                    Some(Member {
                        name: n.to_string(),
                        nested: false,
                    })
                } else if allow_nested && has_extension(path, &ARCHIVE_EXTENSIONS) {
                    Some(Member {
                        name: n.to_string(),
                        nested: true,
                    })
                } else {
                    None
                }
            })
            .collect();

        debug!(archive = %name, members = pending.len(), "opened archive");
        Self {
            name,
            zip,
            pending: pending.into_iter(),
        }
    }

    fn member_name(&self, member: &Member) -> String {
        format!("{}!/{}", self.name, member.name)
    }

    fn entry(&mut self, member: &Member) -> Result<Entry<'_>> {
        let name = self.member_name(member);
        match self.zip.by_name(&member.name) {
            Ok(file) => Ok(Entry {
                name,
                reader: EntryReader::Archived(file),
            }),
            Err(source) => Err(Error::ArchiveMember { name, source }),
        }
    }

    fn open_nested(&mut self, member: &Member, prefixes: Option<&[String]>) -> Result<Self> {
        let name = self.member_name(member);
        let mut file = match self.zip.by_name(&member.name) {
            Ok(file) => file,
            Err(source) => return Err(Error::ArchiveMember { name, source }),
        };
        // sizes come from the archive and may be forged
        let reserve = file.size().min(file.compressed_size()).min(NESTED_RESERVE_LIMIT);
        let mut bytes = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::entry_read(name.as_str(), e))?;
        drop(file);

        let zip = ZipArchive::new(Cursor::new(ArchiveData::Owned(bytes)))
            .map_err(|source| Error::ArchiveMember {
                name: name.clone(),
                source,
            })?;
        Ok(Self::index(name, zip, prefixes, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::Classpath;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::FileOptions;

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "adetect_scan_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    // Stored, empty members. A `forged` member's central directory entry claims
    // a zip64 uncompressed size of u64::MAX.
    fn raw_zip(members: &[(&str, bool)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, forged) in members {
            let offset = out.len() as u32;
            out.extend_from_slice(&0x04034b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&[0; 8]); // flags, method, time, date
            out.extend_from_slice(&[0; 12]); // crc, sizes
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());

            let mut extra = Vec::new();
            if *forged {
                extra.extend_from_slice(&0x0001u16.to_le_bytes());
                extra.extend_from_slice(&8u16.to_le_bytes());
                extra.extend_from_slice(&u64::MAX.to_le_bytes());
            }
            let size = if *forged { u32::MAX } else { 0 };
            central.extend_from_slice(&0x02014b50u32.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&[0; 8]); // flags, method, time, date
            central.extend_from_slice(&0u32.to_le_bytes()); // crc
            central.extend_from_slice(&0u32.to_le_bytes()); // compressed
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0; 10]); // comment, disk, attributes
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
            central.extend_from_slice(&extra);
        }
        let central_offset = out.len() as u32;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&(members.len() as u16).to_le_bytes());
        out.extend_from_slice(&(members.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn drain(sources: &Sources) -> (Vec<(String, Vec<u8>, bool)>, usize) {
        let mut seen = Vec::new();
        let mut errors = 0;
        let mut entries = sources.entries();
        while let Some(next) = entries.next_entry() {
            match next {
                Ok(mut entry) => {
                    let mut content = Vec::new();
                    entry.read_to_end(&mut content).unwrap();
                    seen.push((entry.name().to_string(), content, entry.is_file()));
                }
                Err(e) => {
                    assert!(e.is_recoverable(), "unexpected fatal error: {e}");
                    errors += 1;
                }
            }
        }
        (seen, errors)
    }

    #[test]
    fn package_prefix_appends_slash_once() {
        assert_eq!(package_prefix("com.example"), "com/example/");
        assert_eq!(package_prefix("com/example/"), "com/example/");
    }

    #[test]
    fn from_paths_rejects_missing_paths() {
        let dir = temp_dir("missing");
        let err = Sources::from_paths(&[dir.join("nope")]).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
        assert!(!err.is_recoverable());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn from_paths_classifies_and_dedupes_roots() {
        let dir = temp_dir("classify");
        std::fs::create_dir_all(dir.join("classes")).unwrap();
        std::fs::write(dir.join("lib.jar"), jar_bytes(&[("a/A.class", b"x")])).unwrap();
        std::fs::write(dir.join("One.class"), b"\xCA\xFE\xBA\xBE").unwrap();

        let sources = Sources::from_paths(&[
            dir.join("classes"),
            dir.join("classes/../classes"),
            dir.join("lib.jar"),
            dir.join("One.class"),
        ])
        .unwrap();

        assert_eq!(sources.len(), 3);
        let kinds: Vec<&Root> = sources.roots().collect();
        assert!(matches!(kinds[0], Root::Directory(_)));
        assert!(matches!(kinds[1], Root::Archive(_)));
        assert!(matches!(kinds[2], Root::File(_)));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn directories_yield_class_files_and_open_archives() {
        let dir = temp_dir("walk");
        std::fs::create_dir_all(dir.join("a/b")).unwrap();
        std::fs::write(dir.join("a/b/C.class"), b"c").unwrap();
        std::fs::write(dir.join("a/readme.txt"), b"ignored").unwrap();
        std::fs::write(
            dir.join("a/lib.jar"),
            jar_bytes(&[("x/Y.class", b"y"), ("META-INF/MANIFEST.MF", b"m")]),
        )
        .unwrap();

        let sources = Sources::from_paths(&[&dir]).unwrap();
        let (seen, errors) = drain(&sources);

        assert_eq!(errors, 0);
        let names: Vec<&str> = seen.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("a/b/C.class"));
        assert!(names[1].ends_with("a/lib.jar!/x/Y.class"));
        assert!(seen[0].2);
        assert!(!seen[1].2);
        assert_eq!(seen[1].1, b"y");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn nested_archives_are_iterated_one_level_down() {
        let dir = temp_dir("nested");
        let inner = jar_bytes(&[("p/Inner.class", b"inner"), ("q/Other.class", b"other")]);
        let innermost = jar_bytes(&[("p/Deep.class", b"deep")]);
        let middle_with_jar = jar_bytes(&[("deeper.jar", &innermost)]);
        let outer = jar_bytes(&[
            ("p/Outer.class", b"outer"),
            ("WEB-INF/lib/inner.jar", &inner),
            ("WEB-INF/lib/middle.jar", &middle_with_jar),
        ]);
        let war = dir.join("app.war");
        std::fs::write(&war, outer).unwrap();

        let sources = Sources::from_roots([Root::from_path(&war).unwrap()], None);
        let (seen, errors) = drain(&sources);
        assert_eq!(errors, 0);
        let contents: Vec<&[u8]> = seen.iter().map(|(_, c, _)| c.as_slice()).collect();
        assert_eq!(contents, vec![&b"inner"[..], &b"other"[..], &b"outer"[..]]);
        assert!(seen[0].0.ends_with("app.war!/WEB-INF/lib/inner.jar!/p/Inner.class"));

        let filtered = Sources::from_roots(
            [Root::from_path(&war).unwrap()],
            Some(vec!["p/".to_string()]),
        );
        let (seen, _) = drain(&filtered);
        let contents: Vec<&[u8]> = seen.iter().map(|(_, c, _)| c.as_slice()).collect();
        assert_eq!(contents, vec![&b"inner"[..], &b"outer"[..]]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn broken_archive_inside_directory_is_skipped() {
        let dir = temp_dir("broken");
        std::fs::write(dir.join("bad.jar"), b"not a zip at all").unwrap();
        std::fs::write(dir.join("Good.class"), b"g").unwrap();

        let sources = Sources::from_paths(&[&dir]).unwrap();
        let (seen, errors) = drain(&sources);
        assert_eq!(errors, 1);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, b"g");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn split_keeps_filter_per_root() {
        let dir = temp_dir("split");
        std::fs::create_dir_all(dir.join("one")).unwrap();
        std::fs::create_dir_all(dir.join("two")).unwrap();
        let roots = [
            Root::from_path(&dir.join("one")).unwrap(),
            Root::from_path(&dir.join("two")).unwrap(),
        ];
        let sources = Sources::from_roots(roots, Some(vec!["a/".into(), "a/".into()]));
        assert_eq!(sources.prefixes(), Some(&["a/".to_string()][..]));

        let parts = sources.split();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.len() == 1 && p.prefixes() == sources.prefixes()));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn nested_archive_with_forged_size_is_skipped() {
        let dir = temp_dir("forged");
        let war = dir.join("app.war");
        std::fs::write(&war, raw_zip(&[("a/B.class", false), ("lib/inner.jar", true)])).unwrap();

        let sources = Sources::from_roots([Root::from_path(&war).unwrap()], None);
        let (seen, errors) = drain(&sources);
        assert_eq!(errors, 1);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.ends_with("app.war!/a/B.class"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn nested_archive_extensions_ignore_case() {
        let dir = temp_dir("extensions");
        let upper = jar_bytes(&[("p/A.class", b"a")]);
        let zipped = jar_bytes(&[("p/B.class", b"b")]);
        let outer = jar_bytes(&[("lib/UPPER.JAR", &upper), ("lib/more.zip", &zipped)]);
        let jar = dir.join("outer.jar");
        std::fs::write(&jar, outer).unwrap();

        let (seen, errors) = drain(&Sources::from_paths(&[&jar]).unwrap());
        assert_eq!(errors, 0);
        let contents: Vec<&[u8]> = seen.iter().map(|(_, c, _)| c.as_slice()).collect();
        assert_eq!(contents, vec![&b"a"[..], &b"b"[..]]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn roots_inside_directory_roots_are_scanned_once() {
        let dir = temp_dir("overlap");
        std::fs::create_dir_all(dir.join("a/b")).unwrap();
        std::fs::write(dir.join("a/b/C.class"), b"c").unwrap();
        std::fs::write(dir.join("a/lib.jar"), jar_bytes(&[("x/Y.class", b"y")])).unwrap();
        // an archive the walk would not open by name
        std::fs::write(dir.join("a/data.bin"), jar_bytes(&[("x/Z.class", b"z")])).unwrap();

        let sources = Sources::from_paths(&[
            dir.join("a/b"),
            dir.join("a"),
            dir.join("a/lib.jar"),
            dir.join("a/b/C.class"),
            dir.join("a/data.bin"),
        ])
        .unwrap();
        assert_eq!(sources.len(), 2);
        let (seen, errors) = drain(&sources);
        assert_eq!(errors, 0);
        let contents: Vec<&[u8]> = seen.iter().map(|(_, c, _)| c.as_slice()).collect();
        assert_eq!(contents, vec![&b"c"[..], &b"y"[..], &b"z"[..]]);

        let classpath = Classpath::new([dir.clone()]);
        let packaged = Sources::from_packages(&classpath, &["a", "a.b"]).unwrap();
        assert_eq!(packaged.len(), 1);
        let (seen, _) = drain(&packaged);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.ends_with("a/b/C.class"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_entries_are_followed() {
        let dir = temp_dir("links");
        std::fs::create_dir_all(dir.join("outside")).unwrap();
        std::fs::create_dir_all(dir.join("root")).unwrap();
        std::fs::write(dir.join("outside/Real.class"), b"r").unwrap();
        std::fs::write(dir.join("outside/lib.jar"), jar_bytes(&[("p/Q.class", b"q")])).unwrap();
        std::os::unix::fs::symlink(dir.join("outside/Real.class"), dir.join("root/Link.class"))
            .unwrap();
        std::os::unix::fs::symlink(dir.join("outside/lib.jar"), dir.join("root/link.jar")).unwrap();

        let (seen, errors) = drain(&Sources::from_paths(&[dir.join("root")]).unwrap());
        assert_eq!(errors, 0);
        let contents: Vec<&[u8]> = seen.iter().map(|(_, c, _)| c.as_slice()).collect();
        assert_eq!(contents, vec![&b"r"[..], &b"q"[..]]);
        let _ = std::fs::remove_dir_all(dir);
    }
}
