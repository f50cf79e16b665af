//! Persistent cache of detection results for archives.
//!
//! Uses LMDB (via heed). A key names one archive as it was on disk together
//! with the question asked of it, so a changed archive or a different set of
//! interests simply misses.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::collect::Hit;

pub const HITS_DB: &str = "archive_hits";

const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug)]
pub struct HitCache {
    env: Env,
    db_path: PathBuf,
    hits: StrDb,
}

impl HitCache {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = open_env(&db_path)?;
        let mut wtxn = env.write_txn()?;
        let hits = env.create_database::<Str, Str>(&mut wtxn, Some(HITS_DB))?;
        wtxn.commit()?;

        Ok(Self { env, db_path, hits })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<Hit>>> {
        let rtxn = self.env.read_txn()?;
        let Some(raw) = self.hits.get(&rtxn, key)? else {
            return Ok(None);
        };
        let hits = serde_json::from_str(raw)
            .with_context(|| format!("Corrupt cache entry: {key}"))?;
        Ok(Some(hits))
    }

    pub fn put(&self, key: &str, hits: &[Hit]) -> Result<()> {
        let value = serde_json::to_string(hits)?;
        let mut wtxn = self.env.write_txn()?;
        self.hits.put(&mut wtxn, key, &value)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Drops every entry but keeps the database file.
    pub fn clear(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.hits.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let rtxn = self.env.read_txn()?;
        let mut cached_archives = 0u64;
        let mut cached_hits = 0u64;
        let mut corrupt_entries = 0u64;
        for item in self.hits.iter(&rtxn)? {
            let (_, v) = item?;
            cached_archives += 1;
            match serde_json::from_str::<Vec<Hit>>(v) {
                Ok(hits) => cached_hits += hits.len() as u64,
                Err(_) => corrupt_entries += 1,
            }
        }
        Ok(CacheStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            cached_archives,
            cached_hits,
            corrupt_entries,
        })
    }
}

/// `<canonical path>::<mtime nanos>::<fingerprint>`
pub fn archive_key(archive: &Path, fingerprint: &str) -> Result<String> {
    let metadata = std::fs::metadata(archive)
        .with_context(|| format!("Failed to stat archive: {}", archive.display()))?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(format!("{}::{}::{}", archive.display(), mtime, fingerprint))
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: We do not use NO_LOCK and keep default LMDB locking guarantees.
    // NO_SUB_DIR keeps the database a single file at --db.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open db env: {}", db_path.display()))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub db_path: String,
    pub cached_archives: u64,
    pub cached_hits: u64,
    pub corrupt_entries: u64,
}
