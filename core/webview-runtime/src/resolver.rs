//! Version selection against the vendor's release list.
//!
//! Both lookups are exact and case-sensitive: the selected version string
//! must equal the entry's version, and the requested architecture name must
//! equal one of the entry's architecture names.
//!
//! ## Which entry is "latest"
//!
//! The vendor lists releases newest first, so by default `latest` is the
//! first entry ([`LatestStrategy::FirstListed`]). That ordering is an
//! observation about the page, not a published guarantee.
//! [`LatestStrategy::HighestVersion`] instead picks the greatest version
//! number in the list.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::architecture::Architecture;
use crate::errors::FetchError;
use crate::metadata::WebviewMetadataEntry;
use crate::version::{RuntimeVersion, VersionSelector};

/// How `latest` is chosen from the release list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LatestStrategy {
    /// Trust the vendor's ordering and take the first entry.
    #[default]
    FirstListed,
    /// Take the entry with the highest four-part version.
    HighestVersion,
}

/// A selector resolved to one concrete package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDownload {
    /// Package URL.
    pub url: String,
    /// The exact version; never `latest`.
    pub version: RuntimeVersion,
    /// The requested architecture.
    pub architecture: Architecture,
}

/// The directory name a resolved runtime is installed under.
///
/// Formatted as `<product-prefix>.<version>.<architecture>`, which is also the
/// name of the payload directory inside the vendor's package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallationTarget(String);

/// Product prefix of the vendor's fixed-version runtime packages.
pub const DEFAULT_PRODUCT_PREFIX: &str = "Microsoft.WebView2.FixedVersionRuntime";

impl InstallationTarget {
    /// Builds the target name for a resolved download.
    #[must_use]
    pub fn new(prefix: &str, download: &ResolvedDownload) -> Self {
        Self(format!(
            "{prefix}.{}.{}",
            download.version, download.architecture
        ))
    }

    /// Returns the directory name.
    #[must_use]
    pub fn dir_name(&self) -> &str {
        &self.0
    }

    /// Returns the relative path written into the build configuration.
    #[must_use]
    pub fn config_path(&self) -> String {
        format!("./{}/", self.0)
    }
}

impl fmt::Display for InstallationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves `selector` and `architecture` against the release list.
///
/// # Errors
///
/// - `VersionNotFound` if no entry carries the selected version
/// - `ArchitectureNotFound` if the entry has no package for `architecture`
/// - `EmptyMetadata` if `entries` is empty (or, for
///   [`LatestStrategy::HighestVersion`], has no parseable version)
/// - `MetadataNotFound` if the chosen entry's version is not a four-part version
pub fn resolve(
    entries: &[WebviewMetadataEntry],
    selector: &VersionSelector,
    architecture: Architecture,
    latest: LatestStrategy,
) -> Result<ResolvedDownload, FetchError> {
    let entry = match selector {
        VersionSelector::Latest => latest_entry(entries, latest)?,
        VersionSelector::Exact(version) => find_version(entries, &version.to_string())
            .ok_or_else(|| FetchError::version_not_found(version.to_string()))?,
    };
    debug!("Selected runtime version {}", entry.version);

    let version: RuntimeVersion = entry.version.parse().map_err(|e| {
        FetchError::metadata_not_found_with_source(
            format!("vendor version '{}' is not a four-part version", entry.version),
            Box::new(e),
        )
    })?;

    let link = entry.find_download(architecture).ok_or_else(|| {
        FetchError::architecture_not_found(
            &entry.version,
            architecture.as_str(),
            &entry.architectures(),
        )
    })?;

    Ok(ResolvedDownload {
        url: link.url.clone(),
        version,
        architecture,
    })
}

/// Finds the entry whose version string equals `version` exactly.
#[must_use = "returns version info without side effects"]
pub fn find_version<'a>(
    entries: &'a [WebviewMetadataEntry],
    version: &str,
) -> Option<&'a WebviewMetadataEntry> {
    entries.iter().find(|entry| entry.version == version)
}

/// Returns the entry `latest` stands for under `strategy`.
///
/// # Errors
///
/// Returns `EmptyMetadata` if no entry qualifies.
pub fn latest_entry(
    entries: &[WebviewMetadataEntry],
    strategy: LatestStrategy,
) -> Result<&WebviewMetadataEntry, FetchError> {
    let entry = match strategy {
        LatestStrategy::FirstListed => entries.first(),
        LatestStrategy::HighestVersion => entries
            .iter()
            .filter_map(|entry| {
                entry
                    .version
                    .parse::<RuntimeVersion>()
                    .ok()
                    .map(|v| (v, entry))
            })
            // `max_by_key` keeps the last maximum; reverse so the first listed wins ties.
            .rev()
            .max_by_key(|(v, _)| *v)
            .map(|(_, entry)| entry),
    };
    entry.ok_or(FetchError::EmptyMetadata)
}

/// Returns every listed version with the architectures it offers, in vendor order.
#[must_use = "returns version list without side effects"]
pub fn available_versions(entries: &[WebviewMetadataEntry]) -> Vec<(&str, Vec<&str>)> {
    entries
        .iter()
        .map(|entry| (entry.version.as_str(), entry.architectures()))
        .collect()
}
