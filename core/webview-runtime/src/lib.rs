#![warn(clippy::pedantic)]
//! Fixed-Version WebView2 Runtime Acquisition
//!
//! This crate locates, downloads, unpacks and installs a fixed-version
//! WebView2 runtime, and can point a Tauri build configuration at the
//! installed copy so bundles ship their own runtime.
//!
//! ## Overview
//!
//! ```text
//! vendor page → release list → ResolvedDownload → package.cab → extracted/
//!             → <output>/<product>.<version>.<arch>/ → tauri.conf.json
//! ```
//!
//! Each step is a standalone module; [`pipeline::Pipeline`] sequences them,
//! owns the per-run scratch workspace and tags failures with the stage that
//! raised them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webview_runtime::{Architecture, FetchConfig, Pipeline, VersionSelector};
//!
//! async fn install() -> anyhow::Result<()> {
//!     let mut config = FetchConfig::new("./runtimes");
//!     config.config_file = Some("src-tauri/tauri.conf.json".into());
//!
//!     let mut pipeline = Pipeline::http(config, None)?;
//!     let report = pipeline.run(&VersionSelector::Latest, Architecture::X64).await?;
//!     println!("installed {}", report.install_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`metadata`]: release list embedded in the vendor page
//! - [`resolver`]: selector and architecture to a single package URL
//! - [`download`]: streaming package download with progress events
//! - [`archive`]: cabinet extraction
//! - [`install`]: replacing the installation directory
//! - [`config_patch`]: updating `tauri.conf.json`
//! - [`pipeline`]: the stage machine tying the above together

pub mod architecture;
pub mod archive;
pub mod config_patch;
pub mod download;
pub mod errors;
pub mod install;
pub mod metadata;
pub mod pipeline;
pub mod resolver;
pub mod scratch;
pub mod version;

pub use architecture::Architecture;
pub use errors::FetchError;
pub use metadata::{MetadataOptions, WebviewMetadataEntry};
pub use pipeline::{FetchConfig, InstallReport, Pipeline, PipelineError, Stage};
pub use resolver::{InstallationTarget, LatestStrategy, ResolvedDownload};
pub use version::{RuntimeVersion, VersionSelector};
