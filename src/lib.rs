//! # adetect
//!
//! Fast detection of Java annotations in compiled class files, without
//! loading or linking the classes.
//!
//! ## Architecture
//!
//! - **buffer**: Growable byte cursor with big-endian and modified UTF-8 reads
//! - **constant_pool**: Constant pool decoding and name resolution
//! - **reporter**: Interest sets and per-level report callbacks
//! - **detect**: Class file decoder driving the reporter
//! - **scan**: Directory, archive and nested archive enumeration
//! - **classpath**: Classpath elements and resource URL mapping
//! - **cache**: Persistent per-archive result cache (LMDB)
//! - **collect**: Parallel collection of hits across roots
//! - **error**: Library error type

pub mod buffer;
pub mod cache;
pub mod classpath;
pub mod cli;
pub mod collect;
pub mod config;
pub mod constant_pool;
pub mod detect;
pub mod error;
pub mod reporter;
pub mod scan;

#[cfg(test)]
mod fixture;

pub use detect::{Detector, Outcome, ScanSummary};
pub use error::{Error, Result};
pub use reporter::{InterestSet, Level, Reporter};
