use adetect::cache::HitCache;
use adetect::cli::{Cli, Commands, OutputFormat};
use adetect::collect::{Collected, Collector, Hit, Interests};
use adetect::config::{clear_db, resolve_classpath, resolve_db_path};
use adetect::reporter::Level;
use adetect::scan::Sources;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.clone() {
        Commands::Clear => {
            let db_path = resolve_db_path(&cli)?;
            clear_db(&db_path)?;
        }
        Commands::Stats => {
            let db_path = resolve_db_path(&cli)?;
            let cache = HitCache::open(db_path)?;
            let stats = cache.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Scan {
            paths,
            packages,
            types,
            fields,
            methods,
            format,
            jobs,
            no_cache,
            output,
        } => {
            let request = ScanRequest {
                paths,
                packages,
                interests: Interests {
                    types,
                    fields,
                    methods,
                },
                jobs,
                cache: !no_cache,
            };
            let result = scan(&cli, request)?;
            write_scan_output(&result, format, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct ScanRequest {
    paths: Vec<PathBuf>,
    packages: Vec<String>,
    interests: Interests,
    jobs: usize,
    cache: bool,
}

#[derive(Debug, Serialize)]
struct ScanResult {
    roots: usize,
    duration_ms: u64,
    #[serde(flatten)]
    collected: Collected,
}

fn scan(cli: &Cli, request: ScanRequest) -> Result<ScanResult> {
    let start = Instant::now();

    let sources = if !request.paths.is_empty() {
        Sources::from_paths(&request.paths).context("Failed to resolve scan paths")?
    } else if !request.packages.is_empty() {
        let classpath = resolve_classpath(cli);
        Sources::from_packages(&classpath, &request.packages)
            .with_context(|| format!("Failed to resolve packages: {}", request.packages.join(", ")))?
    } else {
        let classpath = resolve_classpath(cli);
        if classpath.is_empty() {
            anyhow::bail!("Nothing to scan: give paths, or set --classpath or CLASSPATH");
        }
        classpath.sources().context("Failed to resolve classpath")?
    };
    debug!(roots = sources.len(), "resolved sources");

    let mut collector = Collector::new(request.interests).jobs(request.jobs);
    if request.cache {
        let db_path = resolve_db_path(cli)?;
        collector = collector.with_cache(HitCache::open(db_path)?);
    }
    let collected = collector.collect(&sources)?;

    Ok(ScanResult {
        roots: sources.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        collected,
    })
}

fn describe_hit(hit: &Hit) -> String {
    match (&hit.level, &hit.member) {
        (Level::Type, _) | (_, None) => {
            format!("{} {} {}", hit.level.as_str(), hit.annotation, hit.class_name)
        }
        (_, Some(member)) => format!(
            "{} {} {}#{}",
            hit.level.as_str(),
            hit.annotation,
            hit.class_name,
            member
        ),
    }
}

fn write_scan_output(result: &ScanResult, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => {
            let summary = &result.collected.summary;
            let mut out = String::new();
            out.push_str(&format!("roots: {}\n", result.roots));
            out.push_str(&format!("class_files: {}\n", summary.class_files));
            out.push_str(&format!("failed: {}\n", summary.failed));
            out.push_str(&format!("cached_roots: {}\n", result.collected.cached_roots));
            out.push_str(&format!("duration_ms: {}\n", result.duration_ms));
            for hit in &result.collected.hits {
                out.push_str(&format!("- {}\n", describe_hit(hit)));
            }
            out
        }
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
