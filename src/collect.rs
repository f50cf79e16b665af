//! Parallel collection of annotation hits.
//!
//! Every root of a [`Sources`] is scanned by its own [`Detector`] on a rayon
//! pool. Archive roots consult the [`HitCache`] first.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use tracing::{debug, info, warn};

use crate::cache::{HitCache, archive_key};
use crate::detect::{Detector, ScanSummary};
use crate::reporter::{InterestSet, Level, Reporter};
use crate::scan::Sources;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hit {
    pub level: Level,
    pub annotation: String,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

/// Dotted annotation names of interest, per level. An empty list leaves that
/// level unreported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interests {
    pub types: Vec<String>,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
}

impl Interests {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    /// A reporter appending every hit to `sink`.
    pub fn reporter<'a>(&self, sink: &'a RefCell<Vec<Hit>>) -> Reporter<'a, String> {
        let mut reporter = Reporter::new();
        if !self.types.is_empty() {
            reporter = reporter.on_type(
                InterestSet::of_names(&self.types),
                move |annotation: &String, class_name: &str| {
                    sink.borrow_mut().push(Hit {
                        level: Level::Type,
                        annotation: annotation.clone(),
                        class_name: class_name.to_string(),
                        member: None,
                    })
                },
            );
        }
        if !self.fields.is_empty() {
            reporter = reporter.on_field(InterestSet::of_names(&self.fields), member_sink(sink, Level::Field));
        }
        if !self.methods.is_empty() {
            reporter =
                reporter.on_method(InterestSet::of_names(&self.methods), member_sink(sink, Level::Method));
        }
        reporter
    }

    /// Stable digest of the interests and package filter, used in cache keys.
    pub fn fingerprint(&self, prefixes: Option<&[String]>) -> String {
        let mut hasher = Sha256::new();
        for (label, names) in [("type", &self.types), ("field", &self.fields), ("method", &self.methods)] {
            let mut sorted: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
            sorted.sort_unstable();
            sorted.dedup();
            for name in sorted {
                hasher.update(format!("{label}:{}\n", name.replace('/', ".")));
            }
        }
        for prefix in prefixes.unwrap_or_default() {
            hasher.update(format!("prefix:{prefix}\n"));
        }
        hex::encode(hasher.finalize())
    }
}

fn member_sink(sink: &RefCell<Vec<Hit>>, level: Level) -> impl FnMut(&String, &str, &str) + '_ {
    move |annotation: &String, class_name: &str, member: &str| {
        sink.borrow_mut().push(Hit {
            level,
            annotation: annotation.clone(),
            class_name: class_name.to_string(),
            member: Some(member.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Collected {
    pub hits: Vec<Hit>,
    pub summary: ScanSummary,
    pub cached_roots: usize,
}

struct RootResult {
    hits: Vec<Hit>,
    summary: ScanSummary,
    cached: bool,
}

pub struct Collector {
    interests: Interests,
    cache: Option<HitCache>,
    jobs: usize,
}

impl Collector {
    pub fn new(interests: Interests) -> Self {
        Self {
            interests,
            cache: None,
            jobs: 0,
        }
    }

    pub fn with_cache(mut self, cache: HitCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Worker threads; 0 lets rayon decide.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn collect(&self, sources: &Sources) -> Result<Collected> {
        if self.interests.is_empty() {
            bail!("No annotation types given: use --type, --field or --method");
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("Failed to build worker pool")?;
        let fingerprint = self.interests.fingerprint(sources.prefixes());
        let parts = sources.split();

        let results: Vec<Result<RootResult>> = pool.install(|| {
            parts
                .par_iter()
                .map(|part| self.collect_root(part, &fingerprint))
                .collect()
        });

        let mut collected = Collected::default();
        for result in results {
            let root = result?;
            collected.hits.extend(root.hits);
            collected.summary += root.summary;
            if root.cached {
                collected.cached_roots += 1;
            }
        }
        info!(
            roots = parts.len(),
            cached = collected.cached_roots,
            hits = collected.hits.len(),
            "collection finished"
        );
        Ok(collected)
    }

    fn collect_root(&self, part: &Sources, fingerprint: &str) -> Result<RootResult> {
        let Some(root) = part.roots().next() else {
            return Ok(RootResult {
                hits: Vec::new(),
                summary: ScanSummary::default(),
                cached: false,
            });
        };

        let cache_key = match (&self.cache, root.is_archive()) {
            (Some(_), true) => Some(archive_key(root.path(), fingerprint)?),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(hits) = cache.get(key)?
        {
            debug!(root = %root.path().display(), hits = hits.len(), "cache hit");
            let summary = ScanSummary {
                reports: hits.len(),
                ..ScanSummary::default()
            };
            return Ok(RootResult {
                hits,
                summary,
                cached: true,
            });
        }

        let sink = RefCell::new(Vec::new());
        let summary = {
            let mut detector = Detector::new(self.interests.reporter(&sink))?;
            detector
                .detect_sources(part)
                .with_context(|| format!("Failed to scan {}", root.path().display()))?
        };
        let hits = sink.into_inner();

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Err(e) = cache.put(key, &hits)
        {
            warn!(root = %root.path().display(), error = %e, "failed to cache hits");
        }

        Ok(RootResult {
            hits,
            summary,
            cached: false,
        })
    }
}
