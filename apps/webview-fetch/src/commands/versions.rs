//! Versions command for the webview-fetch CLI.
//!
//! Lists the runtime versions the vendor publishes, in the vendor's order,
//! with the architectures available for each. The entry `install` would pick
//! for `latest` is marked, using the same `--latest-by-version` rule.
//!
//! ## Output Format
//!
//! ```text
//! Available runtime versions:
//!
//!   120.0.2210.91 [arm64, x64, x86] (latest)
//!   119.0.2151.97 [arm64, x64, x86]
//! ```

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use webview_runtime::pipeline::{HttpSource, RuntimeSource};
use webview_runtime::resolver::{available_versions, latest_entry};
use webview_runtime::{LatestStrategy, WebviewMetadataEntry};

use super::metadata_options;

/// Arguments for the versions command.
#[derive(Args)]
pub struct VersionsArgs {
    /// Show versions in JSON format.
    #[clap(long, short = 'j')]
    pub json: bool,

    /// Mark the highest version as latest instead of the first listed.
    #[clap(long)]
    pub latest_by_version: bool,

    /// Page carrying the release list [default: $WEBVIEW_FETCH_METADATA_URL or the vendor page].
    #[clap(long)]
    pub metadata_url: Option<String>,
}

/// Version information for JSON output.
#[derive(Debug, Clone, Serialize)]
struct VersionInfo<'a> {
    version: &'a str,
    architectures: Vec<&'a str>,
    latest: bool,
}

/// Executes the versions command.
///
/// # Errors
///
/// Returns an error if the release list cannot be fetched or parsed.
pub async fn execute(args: &VersionsArgs) -> Result<()> {
    let options = metadata_options(args.metadata_url.as_deref());
    let source = HttpSource::new(None)?;
    let entries = source
        .fetch_metadata(&options)
        .await
        .with_context(|| format!("failed to read release list from {}", options.page_url))?;

    let strategy = if args.latest_by_version {
        LatestStrategy::HighestVersion
    } else {
        LatestStrategy::FirstListed
    };
    let latest = latest_index(&entries, strategy);

    if args.json {
        output_json(&entries, latest)?;
    } else {
        output_text(&entries, latest);
    }
    Ok(())
}

/// Position of the entry `latest` resolves to under `strategy`.
fn latest_index(entries: &[WebviewMetadataEntry], strategy: LatestStrategy) -> Option<usize> {
    let latest = latest_entry(entries, strategy).ok()?;
    entries.iter().position(|entry| std::ptr::eq(entry, latest))
}

fn output_json(entries: &[WebviewMetadataEntry], latest: Option<usize>) -> Result<()> {
    let infos: Vec<VersionInfo<'_>> = available_versions(entries)
        .into_iter()
        .enumerate()
        .map(|(index, (version, architectures))| VersionInfo {
            version,
            architectures,
            latest: latest == Some(index),
        })
        .collect();

    let json = serde_json::to_string_pretty(&infos)?;
    println!("{json}");
    Ok(())
}

fn output_text(entries: &[WebviewMetadataEntry], latest: Option<usize>) {
    println!("Available runtime versions:");
    println!();

    for (index, (version, architectures)) in available_versions(entries).into_iter().enumerate() {
        let marker = if latest == Some(index) { " (latest)" } else { "" };
        println!("  {version} [{}]{marker}", architectures.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webview_runtime::metadata::DownloadLink;

    fn entry(version: &str) -> WebviewMetadataEntry {
        WebviewMetadataEntry {
            version: version.to_string(),
            data: vec![DownloadLink {
                architecture: "x64".to_string(),
                url: format!("https://example.com/{version}.cab"),
            }],
        }
    }

    #[test]
    fn latest_marker_follows_strategy() {
        let entries = vec![entry("119.0.2151.97"), entry("121.0.2277.83"), entry("120.0.2210.91")];

        assert_eq!(latest_index(&entries, LatestStrategy::FirstListed), Some(0));
        assert_eq!(latest_index(&entries, LatestStrategy::HighestVersion), Some(1));
    }

    #[test]
    fn latest_marker_is_absent_without_entries() {
        assert_eq!(latest_index(&[], LatestStrategy::FirstListed), None);
    }
}
