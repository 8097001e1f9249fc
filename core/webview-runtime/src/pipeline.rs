//! The acquisition pipeline.
//!
//! A run moves through a fixed sequence of stages:
//!
//! ```text
//! Idle -> MetadataResolving -> Downloading -> Extracting -> Installing
//!      -> [ConfigPatching] -> Done
//! ```
//!
//! Any error moves the run to `Failed` and aborts it. The scratch workspace
//! is owned by the run and is removed before [`Pipeline::run`] returns,
//! whether it succeeds, fails, or its future is dropped mid-flight.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::architecture::Architecture;
use crate::archive::{CabExtractor, PackageExtractor};
use crate::config_patch::patch_config;
use crate::download::{ProgressCallback, download_file, http_client};
use crate::errors::FetchError;
use crate::install::install_payload;
use crate::metadata::{self, MetadataOptions, WebviewMetadataEntry};
use crate::resolver::{
    DEFAULT_PRODUCT_PREFIX, InstallationTarget, LatestStrategy, ResolvedDownload, resolve,
};
use crate::scratch::ScratchWorkspace;
use crate::version::VersionSelector;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Not started, or reset at the start of a run.
    Idle,
    /// Fetching the release list and picking a download.
    MetadataResolving,
    /// Writing the package into the scratch workspace.
    Downloading,
    /// Unpacking the package inside the scratch workspace.
    Extracting,
    /// Moving the payload into the output directory.
    Installing,
    /// Pointing the build configuration at the installed runtime.
    ConfigPatching,
    /// The run completed.
    Done,
    /// The run stopped at an error.
    Failed,
}

impl Stage {
    /// Returns a human-readable name for the stage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MetadataResolving => "metadata resolution",
            Self::Downloading => "download",
            Self::Extracting => "extraction",
            Self::Installing => "installation",
            Self::ConfigPatching => "config patching",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`FetchError`] paired with the stage that was active when it occurred.
#[derive(Debug, Error)]
#[error("failed during {stage}")]
pub struct PipelineError {
    /// The stage that failed.
    pub stage: Stage,
    /// The underlying error.
    #[source]
    pub error: FetchError,
}

impl PipelineError {
    /// Tags `error` with the stage it was raised in.
    #[must_use]
    pub fn new(stage: Stage, error: FetchError) -> Self {
        Self { stage, error }
    }
}

/// Where metadata and packages come from.
pub trait RuntimeSource: Send + Sync {
    /// Fetches and parses the release list.
    fn fetch_metadata(
        &self,
        options: &MetadataOptions,
    ) -> impl Future<Output = Result<Vec<WebviewMetadataEntry>, FetchError>> + Send;

    /// Writes the package at `url` to `dest` and returns its size in bytes.
    fn fetch_package(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

/// [`RuntimeSource`] backed by HTTP.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    progress: Option<ProgressCallback>,
}

impl HttpSource {
    /// Creates a source with the default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `DownloadFailed` if the HTTP client cannot be built.
    pub fn new(progress: Option<ProgressCallback>) -> Result<Self, FetchError> {
        Ok(Self::with_client(http_client()?, progress))
    }

    /// Creates a source over an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, progress: Option<ProgressCallback>) -> Self {
        Self { client, progress }
    }
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSource")
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl RuntimeSource for HttpSource {
    async fn fetch_metadata(
        &self,
        options: &MetadataOptions,
    ) -> Result<Vec<WebviewMetadataEntry>, FetchError> {
        metadata::fetch_metadata(&self.client, options).await
    }

    async fn fetch_package(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        download_file(&self.client, url, dest, self.progress.as_ref()).await
    }
}

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Existing directory the runtime is installed into.
    pub output_dir: PathBuf,
    /// Build configuration to point at the installed runtime, if any.
    pub config_file: Option<PathBuf>,
    /// Where to find the release list.
    pub metadata: MetadataOptions,
    /// Prefix of the installation directory name.
    pub product_prefix: String,
    /// How `latest` is resolved.
    pub latest: LatestStrategy,
    /// Parent of the scratch workspace; the system temp dir when `None`.
    pub scratch_parent: Option<PathBuf>,
}

impl FetchConfig {
    /// Creates a configuration with defaults for everything but the output
    /// directory. The build configuration is left untouched.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            config_file: None,
            metadata: MetadataOptions::default(),
            product_prefix: DEFAULT_PRODUCT_PREFIX.to_string(),
            latest: LatestStrategy::default(),
            scratch_parent: None,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The package that was installed.
    pub download: ResolvedDownload,
    /// Installation directory name.
    pub target: InstallationTarget,
    /// Full path of the installed runtime.
    pub install_dir: PathBuf,
    /// Bytes downloaded.
    pub downloaded: u64,
    /// Files unpacked from the package.
    pub files: usize,
    /// The build configuration that was updated, if any.
    pub config_patched: Option<PathBuf>,
}

/// Sequences the stages of one acquisition.
pub struct Pipeline<S, X> {
    config: FetchConfig,
    source: S,
    extractor: Arc<X>,
    stage: Stage,
}

impl Pipeline<HttpSource, CabExtractor> {
    /// Creates a pipeline that downloads over HTTP and unpacks cabinets.
    ///
    /// # Errors
    ///
    /// Returns `DownloadFailed` if the HTTP client cannot be built.
    pub fn http(config: FetchConfig, progress: Option<ProgressCallback>) -> Result<Self, FetchError> {
        Ok(Self::new(config, HttpSource::new(progress)?, CabExtractor))
    }
}

impl<S: RuntimeSource, X: PackageExtractor> Pipeline<S, X> {
    /// Creates an idle pipeline over the given source and extractor.
    #[must_use]
    pub fn new(config: FetchConfig, source: S, extractor: X) -> Self {
        Self {
            config,
            source,
            extractor: Arc::new(extractor),
            stage: Stage::Idle,
        }
    }

    /// The stage the pipeline is in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The configuration every run uses.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolves, downloads, extracts and installs one runtime, then patches
    /// the build configuration when one is configured.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`] raised, tagged with its stage. Nothing
    /// is retried.
    pub async fn run(
        &mut self,
        selector: &VersionSelector,
        architecture: Architecture,
    ) -> Result<InstallReport, PipelineError> {
        self.stage = Stage::Idle;
        let result = self.run_stages(selector, architecture).await;
        match &result {
            Ok(report) => {
                self.transition(Stage::Done);
                info!("Installed {} to {}", report.target, report.install_dir.display());
            }
            Err(err) => {
                self.transition(Stage::Failed);
                info!("Run aborted: {err}: {}", err.error);
            }
        }
        result
    }

    async fn run_stages(
        &mut self,
        selector: &VersionSelector,
        architecture: Architecture,
    ) -> Result<InstallReport, PipelineError> {
        self.transition(Stage::MetadataResolving);
        // Blocking stages hold their own handle, so the directory outlives a
        // dropped run until the stage's thread lets go of it.
        let workspace = Arc::new(
            ScratchWorkspace::create(self.config.scratch_parent.as_deref())
                .map_err(|e| PipelineError::new(Stage::MetadataResolving, e))?,
        );

        let entries = self
            .source
            .fetch_metadata(&self.config.metadata)
            .await
            .map_err(|e| PipelineError::new(Stage::MetadataResolving, e))?;
        let download = resolve(&entries, selector, architecture, self.config.latest)
            .map_err(|e| PipelineError::new(Stage::MetadataResolving, e))?;
        let target = InstallationTarget::new(&self.config.product_prefix, &download);
        info!("Resolved {selector} ({architecture}) to {target}");

        self.transition(Stage::Downloading);
        let archive = workspace.archive_path();
        let downloaded = self
            .source
            .fetch_package(&download.url, &archive)
            .await
            .map_err(|e| PipelineError::new(Stage::Downloading, e))?;

        self.transition(Stage::Extracting);
        let files = {
            let extractor = Arc::clone(&self.extractor);
            let workspace = Arc::clone(&workspace);
            tokio::task::spawn_blocking(move || {
                extractor.extract(&workspace.archive_path(), &workspace.extract_dir())
            })
            .await
            .map_err(|e| FetchError::extraction_failed("extraction task failed", Box::new(e)))
            .and_then(|result| result)
            .map_err(|e| PipelineError::new(Stage::Extracting, e))?
        };
        debug!("Unpacked {files} files");

        self.transition(Stage::Installing);
        let install_dir = {
            let target = target.clone();
            let output_dir = self.config.output_dir.clone();
            let workspace = Arc::clone(&workspace);
            tokio::task::spawn_blocking(move || {
                install_payload(&workspace.extract_dir(), &target, &output_dir)
            })
            .await
            .map_err(|e| FetchError::io_error("installation task failed", e.into()))
            .and_then(|result| result)
            .map_err(|e| PipelineError::new(Stage::Installing, e))?
        };

        let config_patched = match &self.config.config_file {
            Some(config_file) => {
                let config_file = config_file.clone();
                self.transition(Stage::ConfigPatching);
                patch_config(&config_file, &target)
                    .map_err(|e| PipelineError::new(Stage::ConfigPatching, e))?;
                Some(config_file)
            }
            None => None,
        };

        drop(workspace);
        Ok(InstallReport {
            download,
            target,
            install_dir,
            downloaded,
            files,
            config_patched,
        })
    }

    fn transition(&mut self, next: Stage) {
        info!(from = %self.stage, to = %next, "Pipeline stage changed");
        self.stage = next;
    }
}
