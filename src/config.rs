use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::classpath::Classpath;
use crate::cli::Cli;

pub fn resolve_classpath(cli: &Cli) -> Classpath {
    match cli.classpath.as_deref() {
        Some(value) => Classpath::parse(value),
        None => Classpath::from_env(),
    }
}

pub fn resolve_db_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.db.clone() {
        return Ok(p);
    }

    Ok(adetect_home()?.join("hits.lmdb"))
}

pub fn clear_db(db_path: &Path) -> Result<()> {
    remove_file_if_exists(db_path, "db")?;
    remove_file_if_exists(&lmdb_lock_path(db_path), "db lock")?;
    Ok(())
}

fn adetect_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("adetect"))
}

fn lmdb_lock_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push("-lock");
    PathBuf::from(os)
}

fn remove_file_if_exists(path: &Path, label: &str) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {label} file: {}", path.display()))?;
    }
    Ok(())
}
