//! Per-run scratch workspace.
//!
//! ```text
//! <tmp>/webview-fetch-XXXXXX/
//!   package.cab     # downloaded archive
//!   extracted/      # archive contents
//! ```
//!
//! The directory lives exactly as long as the [`ScratchWorkspace`] value.
//! Dropping it removes the tree; removal failures are logged and otherwise
//! ignored.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::errors::FetchError;

const PREFIX: &str = "webview-fetch-";
const ARCHIVE_NAME: &str = "package.cab";
const EXTRACT_DIR_NAME: &str = "extracted";

/// A uniquely named temporary directory owned by one pipeline run.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchWorkspace {
    /// Creates a fresh workspace below `parent`, or below the system temp
    /// directory when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn create(parent: Option<&Path>) -> Result<Self, FetchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| FetchError::io_error("failed to create scratch directory", e))?;

        let path = dir.path().to_path_buf();
        debug!("Created scratch workspace at {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Root of the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the downloaded package is written.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_NAME)
    }

    /// Where the package is unpacked.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.path.join(EXTRACT_DIR_NAME)
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!("Removed scratch workspace {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove scratch workspace {}: {e}",
                self.path.display()
            ),
        }
    }
}
