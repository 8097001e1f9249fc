//! Install command for the webview-fetch CLI.
//!
//! Resolves a runtime version, downloads and unpacks its package and installs
//! it into the output directory. With `--update-config`, the Tauri
//! configuration is pointed at the installed runtime.
//!
//! ## Usage
//!
//! ```bash
//! webview-fetch install --arch x64 --output src-tauri
//! webview-fetch install 120.0.2210.91 --arch x86 --output src-tauri --update-config
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use webview_runtime::config_patch::DEFAULT_CONFIG_FILE;
use webview_runtime::download::{ProgressCallback, ProgressEvent, format_bytes};
use webview_runtime::{Architecture, FetchConfig, LatestStrategy, Pipeline, VersionSelector};

use super::metadata_options;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install (e.g., "120.0.2210.91" or "latest").
    #[clap(default_value = "latest")]
    pub version: VersionSelector,

    /// Target architecture of the runtime.
    #[clap(long, short = 'a', value_enum)]
    pub arch: Architecture,

    /// Existing directory to install the runtime into.
    #[clap(long, short = 'o')]
    pub output: PathBuf,

    /// Point the Tauri configuration at the installed runtime.
    #[clap(long)]
    pub update_config: bool,

    /// Tauri configuration file to update.
    #[clap(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Resolve "latest" to the highest version instead of the first listed.
    #[clap(long)]
    pub latest_by_version: bool,

    /// Page carrying the release list [default: $WEBVIEW_FETCH_METADATA_URL or the vendor page].
    #[clap(long)]
    pub metadata_url: Option<String>,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if:
/// - The output directory or the configuration file does not exist
/// - Any pipeline stage fails (the error names the stage)
pub async fn execute(args: &InstallArgs) -> Result<()> {
    if !args.output.is_dir() {
        bail!(
            "output directory does not exist: {}",
            args.output.display()
        );
    }
    if args.update_config && !args.config.is_file() {
        bail!(
            "configuration file does not exist: {}",
            args.config.display()
        );
    }

    let mut config = FetchConfig::new(&args.output);
    config.metadata = metadata_options(args.metadata_url.as_deref());
    if args.latest_by_version {
        config.latest = LatestStrategy::HighestVersion;
    }
    if args.update_config {
        config.config_file = Some(args.config.clone());
    }

    println!("Resolving {} for {}...", args.version, args.arch);
    let mut pipeline = Pipeline::http(config, Some(progress_printer()))?;
    let report = pipeline.run(&args.version, args.arch).await?;

    println!(
        "Installed {} to {}",
        report.target,
        report.install_dir.display()
    );
    if let Some(config_file) = &report.config_patched {
        println!(
            "Updated {} to use {}",
            config_file.display(),
            report.target.config_path()
        );
    }

    Ok(())
}

/// Prints download progress on a single, continuously rewritten line.
fn progress_printer() -> ProgressCallback {
    let total = Arc::new(std::sync::atomic::AtomicU64::new(0));
    Arc::new(move |event| match event {
        ProgressEvent::Started { total: size } => {
            total.store(size, std::sync::atomic::Ordering::Relaxed);
            println!("{}", started_line(size));
        }
        ProgressEvent::Progress { downloaded, speed } => {
            let size = total.load(std::sync::atomic::Ordering::Relaxed);
            print!("\r{}     ", progress_line(downloaded, size, speed));
            let _ = std::io::stdout().flush();
        }
        ProgressEvent::Completed { downloaded } => {
            println!("\rDownloaded {}          ", format_bytes(downloaded));
        }
    })
}

/// A size of 0 means the server sent no `Content-Length`.
fn started_line(total: u64) -> String {
    if total > 0 {
        format!("Downloading ({})...", format_bytes(total))
    } else {
        "Downloading...".to_string()
    }
}

fn progress_line(downloaded: u64, total: u64, speed: u64) -> String {
    if total > 0 {
        format!(
            "{}/{} ({}%) {}/s",
            format_bytes(downloaded),
            format_bytes(total),
            percent(downloaded, total),
            format_bytes(speed)
        )
    } else {
        format!("{} {}/s", format_bytes(downloaded), format_bytes(speed))
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(downloaded: u64, total: u64) -> u8 {
    if total > 0 {
        (downloaded as f64 / total as f64 * 100.0).min(100.0) as u8
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_unknown_total() {
        assert_eq!(percent(10, 0), 0);
        assert_eq!(percent(50, 200), 25);
        assert_eq!(percent(300, 200), 100);
    }

    #[test]
    fn unknown_size_is_not_printed() {
        assert_eq!(started_line(0), "Downloading...");
        assert!(!progress_line(2048, 0, 1024).contains('%'));
        assert!(started_line(2048).starts_with("Downloading ("));
        assert!(progress_line(1024, 2048, 1024).contains("(50%)"));
    }
}
