//! Command modules for the webview-fetch CLI.
//!
//! - [`install`] - Resolve, download and install a runtime
//! - [`versions`] - List published runtime versions

pub mod install;
pub mod versions;

use webview_runtime::MetadataOptions;

/// Builds metadata options, preferring an explicit `--metadata-url` over the
/// environment and the built-in default.
pub(crate) fn metadata_options(metadata_url: Option<&str>) -> MetadataOptions {
    let mut options = MetadataOptions::default();
    if let Some(url) = metadata_url.map(str::trim).filter(|url| !url.is_empty()) {
        options.page_url = url.to_string();
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_metadata_url_wins() {
        let options = metadata_options(Some("http://localhost:1/page"));
        assert_eq!(options.page_url, "http://localhost:1/page");
    }

    #[test]
    fn blank_metadata_url_is_ignored() {
        let options = metadata_options(Some("  "));
        assert_eq!(options, MetadataOptions::default());
    }
}
