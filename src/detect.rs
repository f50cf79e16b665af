//! Annotation detection over class files.
//!
//! The [`Detector`] walks a class file section by section in file order,
//! resolving only the names it needs through the constant pool. Attributes
//! other than `RuntimeVisibleAnnotations` and `RuntimeInvisibleAnnotations`
//! are skipped by their declared length, so the cost of a class file is
//! dominated by its constant pool and annotations rather than by code or
//! debug tables.
//!
//! Decoding never loads or links a class. A file that does not start with
//! `0xCAFEBABE` is ignored; a malformed one aborts only its own decode.

use serde::Serialize;
use std::io::Read;
use std::ops::AddAssign;
use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::buffer::ClassFileBuffer;
use crate::classpath::{Classpath, ResourceLoader};
use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reporter::{Level, Reporter};
use crate::scan::Sources;

pub const MAGIC: u32 = 0xCAFEBABE;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

// element_value tags
const BYTE: u8 = b'B';
const CHAR: u8 = b'C';
const DOUBLE: u8 = b'D';
const FLOAT: u8 = b'F';
const INT: u8 = b'I';
const LONG: u8 = b'J';
const SHORT: u8 = b'S';
const BOOLEAN: u8 = b'Z';
const STRING: u8 = b's';
const ENUM: u8 = b'e';
const CLASS: u8 = b'c';
const ANNOTATION: u8 = b'@';
const ARRAY: u8 = b'[';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The entry is too short or lacks the class file magic.
    NotClassFile,
    Decoded { class_name: String, reports: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub entries: usize,
    pub class_files: usize,
    pub not_class_files: usize,
    pub failed: usize,
    pub unreadable: usize,
    pub reports: usize,
}

impl AddAssign for ScanSummary {
    fn add_assign(&mut self, other: Self) {
        self.entries += other.entries;
        self.class_files += other.class_files;
        self.not_class_files += other.not_class_files;
        self.failed += other.failed;
        self.unreadable += other.unreadable;
        self.reports += other.reports;
    }
}

pub struct Detector<'r, H> {
    // reused across entries
    buffer: ClassFileBuffer,
    reporter: Reporter<'r, H>,
}

impl<'r, H> Detector<'r, H> {
    pub fn new(reporter: Reporter<'r, H>) -> Result<Self> {
        if reporter.is_empty() {
            return Err(Error::NoReporter);
        }
        Ok(Self {
            buffer: ClassFileBuffer::new(),
            reporter,
        })
    }

    pub fn reporter(&self) -> &Reporter<'r, H> {
        &self.reporter
    }

    /// Scans every class file on the classpath.
    pub fn detect_classpath(&mut self, classpath: &Classpath) -> Result<ScanSummary> {
        let sources = classpath.sources()?;
        self.detect_sources(&sources)
    }

    /// Scans the classpath locations that provide any of the dotted `packages`.
    pub fn detect_packages<L, S>(&mut self, loader: &L, packages: &[S]) -> Result<ScanSummary>
    where
        L: ResourceLoader + ?Sized,
        S: AsRef<str>,
    {
        let sources = Sources::from_packages(loader, packages)?;
        if sources.is_empty() {
            debug!("no classpath location provides the requested packages");
            return Ok(ScanSummary::default());
        }
        self.detect_sources(&sources)
    }

    /// Scans explicit files and directories.
    pub fn detect_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<ScanSummary> {
        let sources = Sources::from_paths(paths)?;
        self.detect_sources(&sources)
    }

    pub fn detect_sources(&mut self, sources: &Sources) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        let mut entries = sources.entries();

        while let Some(next) = entries.next_entry() {
            let mut entry = match next {
                Ok(entry) => entry,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping unreadable entry");
                    summary.unreadable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            summary.entries += 1;
            match self.detect_stream(&mut entry) {
                Ok(Outcome::NotClassFile) => summary.not_class_files += 1,
                Ok(Outcome::Decoded { reports, .. }) => {
                    summary.class_files += 1;
                    summary.reports += reports;
                }
                Err(e) => {
                    debug!(entry = entry.name(), error = %e, "failed to decode class file");
                    summary.failed += 1;
                }
            }
        }

        info!(
            entries = summary.entries,
            class_files = summary.class_files,
            failed = summary.failed,
            unreadable = summary.unreadable,
            reports = summary.reports,
            "scan finished"
        );
        Ok(summary)
    }

    /// Reads one entry to its end and reports its annotations.
    pub fn detect_stream<R: Read + ?Sized>(&mut self, stream: &mut R) -> Result<Outcome> {
        self.buffer
            .read_from(stream)
            .map_err(|e| Error::entry_read("<stream>", e))?;
        self.detect_buffered()
    }

    /// Like [`Detector::detect_stream`] for bytes already in memory.
    pub fn detect_bytes(&mut self, bytes: &[u8]) -> Result<Outcome> {
        let mut reader = bytes;
        self.detect_stream(&mut reader)
    }

    fn detect_buffered(&mut self) -> Result<Outcome> {
        if !has_magic(&mut self.buffer)? {
            return Ok(Outcome::NotClassFile);
        }
        let mut class_file = ClassFile::open(&mut self.buffer, &mut self.reporter)?;
        class_file.decode()?;
        Ok(Outcome::Decoded {
            class_name: class_file.class_name,
            reports: class_file.reports,
        })
    }
}

fn has_magic(buffer: &mut ClassFileBuffer) -> Result<bool> {
    Ok(buffer.size() > 4 && buffer.read_int()? as u32 == MAGIC)
}

// Decode state for a single class file. Dropped, together with its constant
// pool, as soon as the file is done.
struct ClassFile<'d, 'r, H> {
    input: &'d mut ClassFileBuffer,
    reporter: &'d mut Reporter<'r, H>,
    pool: ConstantPool,
    // external (dotted) name of the class being decoded
    class_name: String,
    member_name: String,
    reports: usize,
}

impl<'d, 'r, H> ClassFile<'d, 'r, H> {
    // Reads everything up to and including the constant pool.
    fn open(input: &'d mut ClassFileBuffer, reporter: &'d mut Reporter<'r, H>) -> Result<Self> {
        let minor = input.read_unsigned_short()?;
        let major = input.read_unsigned_short()?;
        trace!(major, minor, "class file version");
        let pool = ConstantPool::read(input)?;
        Ok(Self {
            input,
            reporter,
            pool,
            class_name: String::new(),
            member_name: String::new(),
            reports: 0,
        })
    }

    fn decode(&mut self) -> Result<()> {
        self.input.skip_bytes(2)?; // access flags
        self.class_name = self.pool.resolve_next(self.input)?.replace('/', ".");
        trace!(class = %self.class_name, "read type");
        self.input.skip_bytes(2)?; // super class
        self.read_interfaces()?;
        self.read_members(Level::Field)?;
        self.read_members(Level::Method)?;
        let reporting = self.reporter.reports(Level::Type);
        self.read_attributes(Level::Type, reporting)
    }

    fn read_interfaces(&mut self) -> Result<()> {
        let count = usize::from(self.input.read_unsigned_short()?);
        self.input.skip_bytes(count * 2)
    }

    fn read_members(&mut self, level: Level) -> Result<()> {
        let count = self.input.read_unsigned_short()?;
        trace!(level = level.as_str(), count, "member count");
        let reporting = self.reporter.reports(level);
        for _ in 0..count {
            self.input.skip_bytes(2)?; // access flags
            self.member_name = self.pool.resolve_next(self.input)?.to_string();
            let descriptor = self.pool.resolve_next(self.input)?;
            trace!(level = level.as_str(), name = %self.member_name, descriptor, "member");
            self.read_attributes(level, reporting)?;
        }
        Ok(())
    }

    fn read_attributes(&mut self, level: Level, reporting: bool) -> Result<()> {
        let count = self.input.read_unsigned_short()?;
        for _ in 0..count {
            let name = self.pool.resolve_next(self.input)?;
            let is_annotations =
                name == RUNTIME_VISIBLE_ANNOTATIONS || name == RUNTIME_INVISIBLE_ANNOTATIONS;
            // u4 in the format
            let length = self.input.read_int()? as u32 as usize;
            if reporting && is_annotations {
                self.read_annotations(level)?;
            } else {
                trace!(attribute = name, length, "skip attribute");
                self.input.skip_bytes(length)?;
            }
        }
        Ok(())
    }

    fn read_annotations(&mut self, level: Level) -> Result<()> {
        let count = self.input.read_unsigned_short()?;
        trace!(level = level.as_str(), count, "annotation count");
        for _ in 0..count {
            let descriptor = self.read_annotation()?;
            let member = match level {
                Level::Type => "",
                Level::Field | Level::Method => self.member_name.as_str(),
            };
            if self
                .reporter
                .report(level, &descriptor, &self.class_name, member)
            {
                self.reports += 1;
            }
        }
        Ok(())
    }

    // Returns the annotation's type descriptor, e.g. `Lcom/example/Plugin;`.
    fn read_annotation(&mut self) -> Result<String> {
        let descriptor = self.pool.resolve_next(self.input)?.to_string();
        let count = self.input.read_unsigned_short()?;
        for _ in 0..count {
            self.input.skip_bytes(2)?; // element_name_index
            self.read_element_value()?;
        }
        Ok(descriptor)
    }

    fn read_element_value(&mut self) -> Result<()> {
        let tag = self.input.read_unsigned_byte()?;
        match tag {
            BYTE | CHAR | DOUBLE | FLOAT | INT | LONG | SHORT | BOOLEAN | STRING | CLASS => {
                self.input.skip_bytes(2)
            }
            ENUM => self.input.skip_bytes(4),
            ANNOTATION => self.read_annotation().map(|_| ()),
            ARRAY => {
                let count = self.input.read_unsigned_short()?;
                for _ in 0..count {
                    self.read_element_value()?;
                }
                Ok(())
            }
            _ => Err(Error::UnknownElementTag { tag }),
        }
    }
}
