#![warn(clippy::pedantic)]

//! # WebView2 Fixed-Version Runtime Installer (webview-fetch)
//!
//! Downloads a fixed-version WebView2 runtime from the vendor's release page,
//! installs it next to a Tauri project and optionally points the project's
//! `tauri.conf.json` at it.
//!
//! ## Subcommands
//!
//! - `install` - Resolve, download and install a runtime
//! - `versions` - List the runtimes the vendor currently publishes
//!
//! ## Examples
//!
//! Install the latest x64 runtime and update the Tauri configuration:
//! ```bash
//! webview-fetch install --arch x64 --output src-tauri --update-config
//! ```
//!
//! Install a pinned version:
//! ```bash
//! webview-fetch install 120.0.2210.91 --arch arm64 --output runtimes
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, versions};

/// Fixed-version WebView2 runtime installer.
#[derive(Parser)]
#[command(
    name = "webview-fetch",
    author,
    version,
    about = "Install fixed-version WebView2 runtimes for Tauri bundles",
    after_help = "\
ENVIRONMENT VARIABLES:
    WEBVIEW_FETCH_METADATA_URL  Page carrying the release list
                                (default: https://developer.microsoft.com/en-us/microsoft-edge/webview2/)
    RUST_LOG                    Log filter, overrides -v"
)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a fixed-version runtime.
    ///
    /// Resolves the requested version against the vendor's release list,
    /// downloads and unpacks the package, and installs it into the output
    /// directory, replacing any previous copy of the same version.
    Install(install::InstallArgs),

    /// List available runtime versions.
    ///
    /// Fetches the vendor's release list and shows each version with the
    /// architectures it is published for.
    Versions(versions::VersionsArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints the error and returns the process exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:#}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::setup_logging(if cli.verbose {
        logging::Level::Verbose
    } else {
        logging::Level::Default
    });

    match cli.command {
        Commands::Install(args) => install::execute(&args).await,
        Commands::Versions(args) => versions::execute(&args).await,
    }
}
