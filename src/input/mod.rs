//! Input abstractions: detectable paths, loaded configurations, and the
//! loader accumulator that collects them over one scan.

pub mod detector;
pub mod formats;

use crate::fs::{Filesystem, PathKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use detector::{ChainDetector, Detector};

/// The configuration format of a loaded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "terraform-config")]
    TerraformConfig,
    #[serde(rename = "terraform-plan")]
    TerraformPlan,
    #[serde(rename = "terraform-state")]
    TerraformState,
    #[serde(rename = "kubernetes")]
    Kubernetes,
    #[serde(rename = "cloudformation")]
    CloudFormation,
    #[serde(rename = "arm")]
    Arm,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::TerraformConfig => "terraform-config",
            InputType::TerraformPlan => "terraform-plan",
            InputType::TerraformState => "terraform-state",
            InputType::Kubernetes => "kubernetes",
            InputType::CloudFormation => "cloudformation",
            InputType::Arm => "arm",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary inputs passed to every detection call.
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    /// Variable files forwarded to Terraform configurations. They do not
    /// affect detection, only the evaluation-ready state.
    pub var_files: Vec<PathBuf>,
}

/// Errors produced while detecting or loading an input.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unsupported input type")]
    UnsupportedInputType,

    #[error("unable to resolve location")]
    UnableToResolveLocation,

    #[error("unrecognized file extension")]
    UnrecognizedFileExtension,

    #[error("failed to parse input")]
    FailedToParse,

    #[error("invalid input for input type")]
    InvalidInput,

    #[error("unable to read file: {path}")]
    UnableToReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to read directory: {path}")]
    UnableToReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A structured diagnostic attached to an evaluation warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub subject: String,
    pub summary: String,
}

/// Non-fatal issues recorded while loading a configuration. These never stop
/// a scan; the scanner classifies them into warnings for the caller.
#[derive(Debug, Clone, Error)]
pub enum DetectWarning {
    #[error("failed to load submodule {module}")]
    SubmoduleLoading { module: String },

    #[error("missing remote submodules in {}: {}", .dir.display(), .missing_modules.join(", "))]
    MissingRemoteSubmodules {
        dir: PathBuf,
        missing_modules: Vec<String>,
    },

    #[error("evaluation produced {} diagnostics", .diagnostics.len())]
    Evaluation { diagnostics: Vec<Diagnostic> },

    #[error("missing term {term}")]
    MissingTerm { term: String },

    #[error("{0}")]
    Other(String),
}

/// A file that can be handed to the detector.
#[derive(Clone)]
pub struct File {
    path: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl File {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lowercased file extension, without the leading dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    pub fn contents(&self) -> Result<Vec<u8>, DetectError> {
        self.fs
            .read(&self.path)
            .map_err(|source| DetectError::UnableToReadFile {
                path: self.path.clone(),
                source,
            })
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File").field("path", &self.path).finish()
    }
}

/// A directory that can be handed to the detector, with an ordered walk over
/// its descendants.
#[derive(Clone)]
pub struct Directory {
    path: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    /// List the direct children of this directory, sorted by name.
    pub fn entries(&self) -> Result<Vec<PathBuf>, DetectError> {
        self.fs
            .read_dir(&self.path)
            .map_err(|source| DetectError::UnableToReadDir {
                path: self.path.clone(),
                source,
            })
    }

    /// Walk the descendants of this directory in sorted order.
    ///
    /// The visitor receives each descendant together with its depth relative
    /// to this directory (direct children have depth 1). Returning `true`
    /// skips the descendant: a skipped directory is not descended into.
    pub fn walk<F>(&self, visit: &mut F) -> Result<(), DetectError>
    where
        F: FnMut(&Detectable, usize) -> Result<bool, DetectError>,
    {
        self.walk_inner(&self.path, 1, visit)
    }

    fn walk_inner<F>(&self, dir: &Path, depth: usize, visit: &mut F) -> Result<(), DetectError>
    where
        F: FnMut(&Detectable, usize) -> Result<bool, DetectError>,
    {
        let entries = self
            .fs
            .read_dir(dir)
            .map_err(|source| DetectError::UnableToReadDir {
                path: dir.to_path_buf(),
                source,
            })?;

        for entry in entries {
            let kind = self
                .fs
                .stat(&entry)
                .map_err(|source| DetectError::UnableToReadFile {
                    path: entry.clone(),
                    source,
                })?;

            match kind {
                PathKind::Directory => {
                    let detectable =
                        Detectable::Directory(Directory::new(&entry, Arc::clone(&self.fs)));

                    if !visit(&detectable, depth)? {
                        self.walk_inner(&entry, depth + 1, visit)?;
                    }
                }
                PathKind::File => {
                    let detectable = Detectable::File(File::new(&entry, Arc::clone(&self.fs)));
                    visit(&detectable, depth)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("path", &self.path)
            .finish()
    }
}

/// Either a file or a directory, as handed to the detector.
#[derive(Debug, Clone)]
pub enum Detectable {
    File(File),
    Directory(Directory),
}

impl Detectable {
    pub fn path(&self) -> &Path {
        match self {
            Detectable::File(file) => file.path(),
            Detectable::Directory(dir) => dir.path(),
        }
    }
}

/// One successfully recognized and loaded unit of IaC content.
#[derive(Debug, Clone)]
pub struct LoadedConfiguration {
    /// The recognized format. Every configuration has exactly one.
    pub input_type: InputType,
    /// The path the configuration was loaded from.
    pub path: PathBuf,
    /// The files the configuration spans.
    pub files: Vec<PathBuf>,
    /// The parsed generic document, where the format has one.
    pub document: serde_json::Value,
    /// Variable files recorded for the evaluation-ready state.
    pub var_files: Vec<PathBuf>,
    /// Non-fatal issues recorded while loading.
    pub warnings: Vec<DetectWarning>,
}

impl LoadedConfiguration {
    pub fn new(input_type: InputType, path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        Self {
            input_type,
            files: vec![path.clone()],
            path,
            document: serde_json::Value::Null,
            var_files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: serde_json::Value) -> Self {
        self.document = document;
        self
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    pub fn with_var_files(mut self, var_files: Vec<PathBuf>) -> Self {
        self.var_files = var_files;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<DetectWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Convert to the evaluation-ready state handed to the policy evaluator.
    pub fn to_state(&self) -> InputState {
        InputState {
            input_type: self.input_type,
            meta: serde_json::json!({
                "filepath": self.path.display().to_string(),
            }),
            document: self.document.clone(),
            var_files: self.var_files.clone(),
        }
    }
}

/// The evaluation-ready, normalized form of a loaded configuration.
///
/// The `meta` object identifies the input across evaluation passes; the
/// suppression engine pairs results by a content hash of `meta` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    pub input_type: InputType,
    pub meta: serde_json::Value,
    pub document: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub var_files: Vec<PathBuf>,
}

/// Accumulates loaded configurations over one scan.
///
/// Owned by a single scanner invocation; read-only afterwards.
pub struct Loader {
    detector: ChainDetector,
    configurations: Vec<LoadedConfiguration>,
    errors: BTreeMap<PathBuf, Vec<DetectWarning>>,
}

impl Loader {
    pub fn new(detector: ChainDetector) -> Self {
        Self {
            detector,
            configurations: Vec::new(),
            errors: BTreeMap::new(),
        }
    }

    /// Attempt to detect and load one path. Returns whether a configuration
    /// was loaded; `false` with no error means the path was not recognized.
    pub fn load(
        &mut self,
        detectable: &Detectable,
        options: &DetectOptions,
    ) -> Result<bool, DetectError> {
        let config = match detectable {
            Detectable::File(file) => self.detector.detect_file(file, options)?,
            Detectable::Directory(dir) => self.detector.detect_directory(dir, options)?,
        };

        let Some(config) = config else {
            return Ok(false);
        };

        if !config.warnings.is_empty() {
            self.errors
                .entry(config.path.clone())
                .or_default()
                .extend(config.warnings.iter().cloned());
        }

        self.configurations.push(config);

        Ok(true)
    }

    /// The number of configurations discovered so far.
    pub fn count(&self) -> usize {
        self.configurations.len()
    }

    pub fn configurations(&self) -> &[LoadedConfiguration] {
        &self.configurations
    }

    /// Non-fatal errors collected during loading, grouped by path.
    pub fn errors(&self) -> &BTreeMap<PathBuf, Vec<DetectWarning>> {
        &self.errors
    }

    /// Convert every loaded configuration to its evaluation-ready state.
    pub fn to_states(&self) -> Vec<InputState> {
        self.configurations
            .iter()
            .map(LoadedConfiguration::to_state)
            .collect()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("count", &self.count())
            .field("errors", &self.errors)
            .finish()
    }
}
