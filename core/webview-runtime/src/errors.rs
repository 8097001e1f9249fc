//! Error types for the runtime acquisition pipeline.
//!
//! Every stage reports failures through [`FetchError`]. Stages never retry or
//! recover locally; errors travel unchanged to the [`Pipeline`] which only
//! tears down the scratch workspace and records the failing stage before
//! handing them to the caller.
//!
//! [`Pipeline`]: crate::pipeline::Pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used as the `source` of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Consolidated error type for the acquisition pipeline.
///
/// Each variant identifies the condition that failed and carries enough
/// context to produce a helpful message.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The vendor page could not be fetched, or carried no usable metadata script.
    #[error("runtime metadata not found: {message}")]
    MetadataNotFound {
        /// What was missing or malformed.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The metadata script was found but listed no runtime versions.
    #[error("runtime metadata is empty")]
    EmptyMetadata,

    /// No metadata entry carries the requested version.
    #[error("version {version} is not available")]
    VersionNotFound {
        /// The version that was requested.
        version: String,
    },

    /// The resolved version has no package for the requested architecture.
    #[error(
        "version {version} has no package for architecture {architecture} (available: {available})"
    )]
    ArchitectureNotFound {
        /// The resolved version.
        version: String,
        /// The requested architecture.
        architecture: String,
        /// Comma-separated architectures the entry does offer.
        available: String,
    },

    /// Network or write failure while downloading the package.
    #[error("download failed: {message}")]
    DownloadFailed {
        /// Description of the download failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The downloaded archive could not be unpacked.
    #[error("extraction failed: {message}")]
    ExtractionFailed {
        /// Description of the extraction failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The extracted archive does not contain the expected runtime directory.
    #[error("runtime payload not found at {path}")]
    PayloadNotFound {
        /// Where the payload was expected.
        path: PathBuf,
    },

    /// The build configuration could not be read, parsed, or written.
    #[error("failed to update {path}: {message}")]
    ConfigUpdateFailed {
        /// The configuration file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Unexpected I/O fault outside the stage-specific conditions above.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates a new `MetadataNotFound` error.
    #[must_use]
    pub fn metadata_not_found(message: impl Into<String>) -> Self {
        Self::MetadataNotFound {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `MetadataNotFound` error with a source error.
    #[must_use]
    pub fn metadata_not_found_with_source(message: impl Into<String>, source: BoxError) -> Self {
        Self::MetadataNotFound {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `VersionNotFound` error.
    #[must_use]
    pub fn version_not_found(version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            version: version.into(),
        }
    }

    /// Creates a new `ArchitectureNotFound` error.
    #[must_use]
    pub fn architecture_not_found(
        version: impl Into<String>,
        architecture: impl Into<String>,
        available: &[&str],
    ) -> Self {
        let available = if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        };
        Self::ArchitectureNotFound {
            version: version.into(),
            architecture: architecture.into(),
            available,
        }
    }

    /// Creates a new `DownloadFailed` error.
    #[must_use]
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `DownloadFailed` error with a source error.
    #[must_use]
    pub fn download_failed_with_source(message: impl Into<String>, source: BoxError) -> Self {
        Self::DownloadFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `ExtractionFailed` error with a source error.
    #[must_use]
    pub fn extraction_failed(message: impl Into<String>, source: BoxError) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `ExtractionFailed` error without an underlying cause.
    #[must_use]
    pub fn extraction_refused(message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `PayloadNotFound` error.
    #[must_use]
    pub fn payload_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PayloadNotFound { path: path.into() }
    }

    /// Creates a new `ConfigUpdateFailed` error.
    #[must_use]
    pub fn config_update_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigUpdateFailed {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `ConfigUpdateFailed` error with a source error.
    #[must_use]
    pub fn config_update_failed_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Self::ConfigUpdateFailed {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}
