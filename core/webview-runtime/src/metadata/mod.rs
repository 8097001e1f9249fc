//! Runtime release metadata published on the vendor's download page.
//!
//! The vendor does not offer a machine-readable release feed. Instead, its
//! download page carries an inline `<script>` that declares the release list
//! as a JavaScript literal:
//!
//! ```html
//! <script nonce="…">
//!   var webView2FixedVersionReleases = [
//!     { version: "120.0.2210.91", data: [
//!       { architecture: "x64", url: "https://…/Microsoft.WebView2.FixedVersionRuntime.120.0.2210.91.x64.cab" },
//!       …
//!     ] },
//!     …
//!   ];
//! </script>
//! ```
//!
//! The script is identified by its `nonce` attribute and its declaration
//! prefix, then read by the sandboxed [`literal`] parser. The page's scripts
//! are never executed.
//!
//! ## Data Source
//!
//! The page URL defaults to [`DEFAULT_METADATA_URL`] and can be overridden via
//! the `WEBVIEW_FETCH_METADATA_URL` environment variable or
//! [`MetadataOptions::page_url`].

pub mod literal;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::architecture::Architecture;
use crate::errors::FetchError;

/// Environment variable to override the metadata page URL.
pub const METADATA_URL_ENV: &str = "WEBVIEW_FETCH_METADATA_URL";

/// Default vendor page listing fixed-version runtimes.
pub const DEFAULT_METADATA_URL: &str =
    "https://developer.microsoft.com/en-us/microsoft-edge/webview2/";

/// `nonce` attribute value carried by the release-data script.
pub const DEFAULT_SCRIPT_NONCE: &str = "webview2-fixed-version-data";

/// Name of the variable the release-data script declares.
pub const DEFAULT_SCRIPT_VARIABLE: &str = "webView2FixedVersionReleases";

/// A download location for one architecture of one runtime version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    /// Architecture name exactly as the vendor lists it.
    pub architecture: String,
    /// Package URL.
    pub url: String,
}

/// One published runtime version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebviewMetadataEntry {
    /// Version string exactly as the vendor lists it.
    pub version: String,
    /// Packages for this version, in vendor order.
    pub data: Vec<DownloadLink>,
}

impl WebviewMetadataEntry {
    /// Returns the package for `architecture`, matched exactly.
    #[must_use = "returns link info without side effects"]
    pub fn find_download(&self, architecture: Architecture) -> Option<&DownloadLink> {
        self.data
            .iter()
            .find(|link| link.architecture == architecture.as_str())
    }

    /// Returns the architecture names this entry offers, in vendor order.
    #[must_use]
    pub fn architectures(&self) -> Vec<&str> {
        self.data
            .iter()
            .map(|link| link.architecture.as_str())
            .collect()
    }
}

/// How to locate the release-data script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Page that embeds the release data.
    pub page_url: String,
    /// Required `nonce` attribute of the script.
    pub nonce: String,
    /// Variable the script declares.
    pub variable: String,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            page_url: metadata_url(),
            nonce: DEFAULT_SCRIPT_NONCE.to_string(),
            variable: DEFAULT_SCRIPT_VARIABLE.to_string(),
        }
    }
}

/// Returns the metadata page URL.
///
/// Checks the `WEBVIEW_FETCH_METADATA_URL` environment variable first, then
/// falls back to [`DEFAULT_METADATA_URL`]. Empty or whitespace-only values
/// are treated as unset.
#[must_use]
pub fn metadata_url() -> String {
    std::env::var(METADATA_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string())
}

/// Fetches the vendor page and extracts the release list.
///
/// # Errors
///
/// Returns `MetadataNotFound` if the page cannot be fetched or carries no
/// usable release-data script, and `EmptyMetadata` if the list is empty.
#[instrument(skip_all, fields(url = %options.page_url))]
pub async fn fetch_metadata(
    client: &reqwest::Client,
    options: &MetadataOptions,
) -> Result<Vec<WebviewMetadataEntry>, FetchError> {
    let url = options.page_url.as_str();

    let response = client.get(url).send().await.map_err(|e| {
        FetchError::metadata_not_found_with_source(format!("failed to fetch {url}"), Box::new(e))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::metadata_not_found(format!(
            "HTTP error {status}: {url}"
        )));
    }

    let html = response.text().await.map_err(|e| {
        FetchError::metadata_not_found_with_source(
            format!("failed to read response from {url}"),
            Box::new(e),
        )
    })?;
    debug!("Fetched {} bytes of metadata page", html.len());

    parse_metadata_page(&html, options)
}

/// Extracts the release list from the vendor page's HTML.
///
/// # Errors
///
/// Returns `MetadataNotFound` if no `<script>` carries both the expected
/// nonce and declaration, or if its literal is malformed or has the wrong
/// shape; returns `EmptyMetadata` if the declared list is empty.
pub fn parse_metadata_page(
    html: &str,
    options: &MetadataOptions,
) -> Result<Vec<WebviewMetadataEntry>, FetchError> {
    let script = script_elements(html)
        .into_iter()
        .filter(|(opening, _)| has_nonce(opening, &options.nonce))
        .map(|(_, body)| body)
        .find(|body| literal::declares(body, &options.variable))
        .ok_or_else(|| {
            FetchError::metadata_not_found(format!(
                "no <script nonce=\"{}\"> declares '{}'",
                options.nonce, options.variable
            ))
        })?;

    let value = match literal::parse_declaration(script, &options.variable) {
        Ok(value) => value,
        Err(raw_err) => {
            // Some pages entity-encode quotes inside inline scripts.
            let decoded = html_escape::decode_html_entities(script);
            literal::parse_declaration(&decoded, &options.variable).map_err(|_| {
                FetchError::metadata_not_found_with_source(
                    format!("'{}' is not a plain literal", options.variable),
                    Box::new(raw_err),
                )
            })?
        }
    };

    let entries: Vec<WebviewMetadataEntry> = serde_json::from_value(value).map_err(|e| {
        FetchError::metadata_not_found_with_source(
            format!("'{}' has an unexpected shape", options.variable),
            Box::new(e),
        )
    })?;

    if entries.is_empty() {
        return Err(FetchError::EmptyMetadata);
    }
    debug!("Parsed {} runtime versions", entries.len());
    Ok(entries)
}

/// Returns the opening tag and raw body of every `<script>` element.
///
/// Script content is raw text in HTML, so the body runs verbatim up to the
/// next `</script`, whatever markup it appears to contain.
fn script_elements(html: &str) -> Vec<(&str, &str)> {
    // ASCII lowercasing keeps byte offsets valid for `html`.
    let lower = html.to_ascii_lowercase();
    let mut scripts = Vec::new();
    let mut pos = 0;

    while let Some(found) = lower[pos..].find("<script") {
        let start = pos + found;
        let name_end = start + "<script".len();
        let terminated = lower
            .as_bytes()
            .get(name_end)
            .is_some_and(|&b| b == b'>' || b == b'/' || b.is_ascii_whitespace());
        if !terminated {
            pos = name_end;
            continue;
        }

        let Some(open_end) = lower[name_end..].find('>').map(|i| name_end + i + 1) else {
            break;
        };
        let body_end = lower[open_end..]
            .find("</script")
            .map_or(html.len(), |i| open_end + i);

        scripts.push((&html[start..open_end], &html[open_end..body_end]));
        pos = body_end;
    }
    scripts
}

/// Whether the opening tag carries `nonce="<expected>"`.
fn has_nonce(opening: &str, expected: &str) -> bool {
    let Ok(dom) = tl::parse(opening, tl::ParserOptions::default()) else {
        return false;
    };
    dom.nodes()
        .iter()
        .find_map(|node| node.as_tag())
        .is_some_and(|tag| {
            matches!(
                tag.attributes().get("nonce"),
                Some(Some(nonce)) if nonce.as_bytes() == expected.as_bytes()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> MetadataOptions {
        MetadataOptions {
            page_url: "http://unused.invalid/".to_string(),
            nonce: "sentinel".to_string(),
            variable: "releases".to_string(),
        }
    }

    fn sample_page() -> &'static str {
        r#"<!DOCTYPE html>
        <html>
          <head>
            <script nonce="sentinel">window.analytics = { enabled: true };</script>
            <script>var releases = [{ version: "6.6.6.6", data: [] }];</script>
          </head>
          <body>
            <p>Download the runtime</p>
            <script nonce="sentinel">
              var releases = [
                {
                  version: "120.0.2210.91",
                  data: [
                    { architecture: "arm64", url: "https://example.com/120.arm64.cab" },
                    { architecture: "x64", url: "https://example.com/120.x64.cab" },
                  ],
                },
                {
                  version: "119.0.2151.97",
                  data: [{ architecture: "x86", url: "https://example.com/119.x86.cab" }],
                  published: "2023-11-30",
                },
              ];
            </script>
          </body>
        </html>"#
    }

    #[test]
    fn parses_entries_from_marked_script() {
        let entries = parse_metadata_page(sample_page(), &options()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, "120.0.2210.91");
        assert_eq!(entries[0].architectures(), ["arm64", "x64"]);
        assert_eq!(entries[1].version, "119.0.2151.97");
        assert_eq!(entries[1].data[0].url, "https://example.com/119.x86.cab");
    }

    #[test]
    fn ignores_scripts_without_matching_nonce() {
        let page = r#"<script nonce="other">var releases = [{ version: "1.0.0.1", data: [] }];</script>"#;
        let err = parse_metadata_page(page, &options()).unwrap_err();
        assert!(matches!(err, FetchError::MetadataNotFound { .. }));
    }

    #[test]
    fn missing_script_is_metadata_not_found() {
        let err = parse_metadata_page("<html><body></body></html>", &options()).unwrap_err();
        assert!(matches!(err, FetchError::MetadataNotFound { .. }));
        assert!(err.to_string().contains("sentinel"));
    }

    #[test]
    fn empty_list_is_empty_metadata() {
        let page = r#"<script nonce="sentinel">var releases = [];</script>"#;
        let err = parse_metadata_page(page, &options()).unwrap_err();
        assert!(matches!(err, FetchError::EmptyMetadata));
    }

    #[test]
    fn executable_content_is_rejected() {
        let page = r#"<script nonce="sentinel">var releases = load();</script>"#;
        let err = parse_metadata_page(page, &options()).unwrap_err();
        assert!(matches!(err, FetchError::MetadataNotFound { .. }));
    }

    #[test]
    fn wrong_shape_is_metadata_not_found() {
        let page = r#"<script nonce="sentinel">var releases = [{ name: "1.0.0.1" }];</script>"#;
        let err = parse_metadata_page(page, &options()).unwrap_err();
        assert!(err.to_string().contains("unexpected shape"));
    }

    #[test]
    fn entity_encoded_scripts_are_decoded() {
        let page = r#"<script nonce="sentinel">var releases = [{ version: &quot;1.0.0.1&quot;, data: [] }];</script>"#;
        let entries = parse_metadata_page(page, &options()).unwrap();
        assert_eq!(entries[0].version, "1.0.0.1");
    }

    #[test]
    fn markup_inside_script_is_kept_verbatim() {
        let page = r#"<script nonce="sentinel">var releases = [{ version: "1.0.0.1", data: [
            { architecture: "x64", url: "https://example.com/<b>x64</b>.cab" }
        ] }];</script>"#;
        let entries = parse_metadata_page(page, &options()).unwrap();
        assert_eq!(entries[0].data[0].url, "https://example.com/<b>x64</b>.cab");
    }

    #[test]
    fn script_elements_splits_tags_and_bodies() {
        let page = r#"<SCRIPT nonce="a">one <p> two</SCRIPT><scripts></scripts><script>three"#;
        assert_eq!(
            script_elements(page),
            [(r#"<SCRIPT nonce="a">"#, "one <p> two"), ("<script>", "three")]
        );
    }

    #[test]
    fn has_nonce_requires_exact_value() {
        assert!(has_nonce(r#"<script nonce="sentinel" async>"#, "sentinel"));
        assert!(!has_nonce(r#"<script nonce="sentinel2">"#, "sentinel"));
        assert!(!has_nonce("<script nonce>", "sentinel"));
        assert!(!has_nonce("<script>", "sentinel"));
    }

    #[test]
    fn find_download_matches_exactly() {
        let entry = WebviewMetadataEntry {
            version: "1.0.0.1".to_string(),
            data: vec![DownloadLink {
                architecture: "X64".to_string(),
                url: "http://x/a.cab".to_string(),
            }],
        };
        assert!(entry.find_download(Architecture::X64).is_none());
    }

    #[test]
    #[serial_test::serial]
    fn metadata_url_uses_default_when_env_not_set() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::remove_var(METADATA_URL_ENV);
        }
        assert_eq!(metadata_url(), DEFAULT_METADATA_URL);
    }

    #[test]
    #[serial_test::serial]
    fn metadata_url_uses_env_when_set() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::set_var(METADATA_URL_ENV, "  http://mirror.local/page  ");
        }
        let url = metadata_url();
        // SAFETY: restoring previous state.
        unsafe {
            std::env::remove_var(METADATA_URL_ENV);
        }
        assert_eq!(url, "http://mirror.local/page");
    }

    #[test]
    #[serial_test::serial]
    fn metadata_url_ignores_blank_env() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::set_var(METADATA_URL_ENV, "   ");
        }
        let url = metadata_url();
        // SAFETY: restoring previous state.
        unsafe {
            std::env::remove_var(METADATA_URL_ENV);
        }
        assert_eq!(url, DEFAULT_METADATA_URL);
    }

    #[tokio::test]
    async fn fetch_metadata_reads_page_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webview2/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sample_page()))
            .mount(&server)
            .await;

        let options = MetadataOptions {
            page_url: format!("{}/webview2/", server.uri()),
            ..options()
        };
        let entries = fetch_metadata(&reqwest::Client::new(), &options)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn fetch_metadata_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let options = MetadataOptions {
            page_url: format!("{}/webview2/", server.uri()),
            ..options()
        };
        let err = fetch_metadata(&reqwest::Client::new(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MetadataNotFound { .. }));
        assert!(err.to_string().contains("404"));
    }
}
