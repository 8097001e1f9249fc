//! Cabinet (`.cab`) extraction for fixed-version runtime packages.
//!
//! The vendor ships each fixed-version runtime as a Microsoft cabinet whose
//! entries live under a single `<product>.<version>.<arch>` folder. Entry
//! names use `\` separators; they are normalised to native paths and checked
//! for traversal before anything is written.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::FetchError;

/// Unpacks an archive into a directory.
///
/// Implementations run on a blocking thread.
pub trait PackageExtractor: Send + Sync + 'static {
    /// Extracts every entry of `archive` below `dest_dir` and returns the
    /// number of files written.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionFailed` if the archive cannot be read or written out.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<usize, FetchError>;
}

/// [`PackageExtractor`] for Microsoft cabinet files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CabExtractor;

impl PackageExtractor for CabExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<usize, FetchError> {
        extract_cab(archive, dest_dir)
    }
}

/// Extracts a cabinet archive to the destination directory.
///
/// Creates the destination directory if it does not exist.
///
/// # Errors
///
/// Returns `ExtractionFailed` if:
/// - The archive cannot be opened or is not a valid cabinet
/// - An entry name is absolute or contains `..`
/// - Directory or file creation fails
/// - Decompressing an entry fails
pub fn extract_cab(archive_path: &Path, dest_dir: &Path) -> Result<usize, FetchError> {
    let file = File::open(archive_path).map_err(|e| {
        FetchError::extraction_failed(
            format!("failed to open archive: {}", archive_path.display()),
            Box::new(e),
        )
    })?;

    let mut cabinet = cab::Cabinet::new(file).map_err(|e| {
        FetchError::extraction_failed(
            format!("failed to read cabinet: {}", archive_path.display()),
            Box::new(e),
        )
    })?;

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        FetchError::extraction_failed(
            format!("failed to create directory: {}", dest_dir.display()),
            Box::new(e),
        )
    })?;

    let names: Vec<String> = cabinet
        .folder_entries()
        .flat_map(|folder| folder.file_entries().map(|entry| entry.name().to_string()))
        .collect();

    for name in &names {
        let relative_path = entry_path(name)?;
        let output_path = dest_dir.join(&relative_path);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FetchError::extraction_failed(
                    format!("failed to create directory: {}", parent.display()),
                    Box::new(e),
                )
            })?;
        }

        let mut reader = cabinet.read_file(name).map_err(|e| {
            FetchError::extraction_failed(format!("failed to read entry: {name}"), Box::new(e))
        })?;
        let mut outfile = File::create(&output_path).map_err(|e| {
            FetchError::extraction_failed(
                format!("failed to create file: {}", output_path.display()),
                Box::new(e),
            )
        })?;
        io::copy(&mut reader, &mut outfile).map_err(|e| {
            FetchError::extraction_failed(
                format!("failed to extract: {}", output_path.display()),
                Box::new(e),
            )
        })?;
    }

    debug!(
        "Extracted {} files from {}",
        names.len(),
        archive_path.display()
    );
    Ok(names.len())
}

/// Converts a cabinet entry name into a relative path.
///
/// Rejects absolute names (leading separator or drive prefix) and names with
/// `..` components so nothing escapes the destination directory.
fn entry_path(name: &str) -> Result<PathBuf, FetchError> {
    let refuse = || {
        FetchError::extraction_refused(format!(
            "refusing to extract path with parent directory or absolute reference: {name}"
        ))
    };

    if name.starts_with(['\\', '/']) || name.contains(':') {
        return Err(refuse());
    }

    let mut path = PathBuf::new();
    for component in name.split(['\\', '/']) {
        match component {
            "" | "." => {}
            ".." => return Err(refuse()),
            part => path.push(part),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(FetchError::extraction_refused(format!(
            "empty entry name in cabinet: {name:?}"
        )));
    }
    Ok(path)
}
