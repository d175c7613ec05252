//! Function code packaging.
//!
//! A codebase is a list of paths. Files keep their own name in the archive,
//! directories keep their base folder (`src/handler.py`) unless written as
//! `dir/*`, which stores paths relative to the directory itself. An entry
//! starting with a 12 digit account number is a container image reference
//! and is deployed as-is.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Archive used when no codebase is configured.
pub const DEFAULT_ARCHIVE: &str = "./data/lambda_code.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codebase {
    /// Prebuilt zip archive.
    Archive(PathBuf),
    /// Container image URI.
    Image(String),
    /// Files to zip, keyed by their path inside the archive.
    Files(BTreeMap<String, PathBuf>),
}

/// True when the entry starts with a 12 digit account number.
#[must_use]
pub fn is_image_reference(entry: &str) -> bool {
    entry
        .as_bytes()
        .get(..12)
        .is_some_and(|account| account.iter().all(u8::is_ascii_digit))
}

/// Classifies a configured codebase and collects its files.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn resolve(codebase: &[String]) -> Result<Codebase> {
    if codebase.is_empty() {
        return Ok(Codebase::Archive(PathBuf::from(DEFAULT_ARCHIVE)));
    }

    if let Some(image) = codebase.iter().find(|entry| is_image_reference(entry)) {
        return Ok(Codebase::Image(image.clone()));
    }

    let mut files = BTreeMap::new();
    for entry in codebase {
        collect(entry, &mut files)?;
    }

    Ok(Codebase::Files(files))
}

fn collect(entry: &str, files: &mut BTreeMap<String, PathBuf>) -> Result<()> {
    let wildcard = entry.ends_with('*');
    let clean = entry.trim_end_matches('*').trim_end_matches('/');
    let path = Path::new(if clean.is_empty() { "." } else { clean });

    let Ok(path) = path.canonicalize() else {
        warn!("{} does not exist and will be skipped", entry);
        return Ok(());
    };

    if path.is_dir() {
        let base = if wildcard {
            String::new()
        } else {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        walk(&path, &path, &base, files)?;
    } else if path.is_file() {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.insert(name, path);
    } else {
        warn!("{} is neither a file nor a directory and will be skipped", entry);
    }

    Ok(())
}

fn walk(
    root: &Path,
    dir: &Path,
    base: &str,
    files: &mut BTreeMap<String, PathBuf>,
) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, base, files)?;
        } else if path.is_file() {
            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("{} is outside {}", path.display(), root.display()))?
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let name = if base.is_empty() {
                relative
            } else {
                format!("{base}/{relative}")
            };
            files.insert(name, path);
        }
    }

    Ok(())
}

/// Writes `files` into a deflated zip archive at `destination`.
///
/// # Errors
/// Returns an error if a source cannot be read or the archive cannot be written.
pub fn write_zip(files: &BTreeMap<String, PathBuf>, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = File::create(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, source) in files {
        let bytes =
            fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;

    debug!(
        archive = %destination.display(),
        entries = files.len(),
        "function archive written"
    );

    Ok(())
}
