//! Extension-gated delegate dispatch for input detection.
//!
//! Each file extension maps to an ordered list of format delegates; the
//! first delegate that recognizes the input wins. JSON and YAML files are
//! syntax-validated before any delegate runs, because some format decoders
//! conflate "malformed syntax" with "wrong shape for this format".

use crate::input::formats::{
    ArmDetector, CfnDetector, KubernetesDetector, TfDetector, TfPlanDetector, TfStateDetector,
};
use crate::input::{DetectError, DetectOptions, Directory, File, LoadedConfiguration};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::trace;

/// A format-specific detection delegate.
///
/// A delegate returns `Ok(Some(_))` when it recognizes and loads the input,
/// `Ok(None)` when the input is not in its format, and `Err(_)` when the
/// input is in its format but cannot be loaded. The default implementations
/// recognize nothing, so a delegate only implements the shapes it supports.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect_file(
        &self,
        _file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        Ok(None)
    }

    fn detect_directory(
        &self,
        _dir: &Directory,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        Ok(None)
    }
}

type SyntaxValidator = fn(&File) -> Result<(), DetectError>;

/// Dispatches detection across the fixed set of format delegates.
pub struct ChainDetector {
    directory_delegates: Vec<Box<dyn Detector>>,
    file_delegates: HashMap<&'static str, Vec<Box<dyn Detector>>>,
    syntax_validators: HashMap<&'static str, SyntaxValidator>,
}

impl ChainDetector {
    pub fn new() -> Self {
        let mut file_delegates: HashMap<&'static str, Vec<Box<dyn Detector>>> = HashMap::new();

        file_delegates.insert(
            "yaml",
            vec![Box::new(CfnDetector), Box::new(KubernetesDetector)],
        );
        file_delegates.insert(
            "yml",
            vec![Box::new(CfnDetector), Box::new(KubernetesDetector)],
        );
        file_delegates.insert(
            "json",
            vec![
                Box::new(CfnDetector),
                Box::new(TfPlanDetector),
                Box::new(TfStateDetector),
                Box::new(ArmDetector),
            ],
        );
        file_delegates.insert("tf", vec![Box::new(TfDetector)]);

        let mut syntax_validators: HashMap<&'static str, SyntaxValidator> = HashMap::new();
        syntax_validators.insert("json", validate_json);
        syntax_validators.insert("yaml", validate_yaml);
        syntax_validators.insert("yml", validate_yaml);

        Self {
            // A directory of .tf files is a single logical unit, so
            // directories are only ever tried against the Terraform delegate.
            directory_delegates: vec![Box::new(TfDetector)],
            file_delegates,
            syntax_validators,
        }
    }

    /// Detect the format of a single file.
    ///
    /// Delegates are tried in declared order; a delegate error is retained
    /// and surfaced only if no later delegate succeeds. `Ok(None)` means the
    /// file was not recognized by any delegate, which is not an error here.
    pub fn detect_file(
        &self,
        file: &File,
        options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        let Some(extension) = file.extension() else {
            return Ok(None);
        };

        if let Some(validate) = self.syntax_validators.get(extension.as_str()) {
            validate(file)?;
        }

        let Some(delegates) = self.file_delegates.get(extension.as_str()) else {
            return Ok(None);
        };

        let mut last_error = None;

        for delegate in delegates {
            match delegate.detect_file(file, options) {
                Ok(Some(config)) => {
                    trace!(
                        path = %file.path().display(),
                        detector = delegate.name(),
                        "recognized input",
                    );
                    return Ok(Some(config));
                }
                Ok(None) => {}
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// Detect whether a directory is a single logical configuration.
    pub fn detect_directory(
        &self,
        dir: &Directory,
        options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        let mut last_error = None;

        for delegate in &self.directory_delegates {
            match delegate.detect_directory(dir, options) {
                Ok(Some(config)) => {
                    trace!(
                        path = %dir.path().display(),
                        detector = delegate.name(),
                        "recognized directory input",
                    );
                    return Ok(Some(config));
                }
                Ok(None) => {}
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

impl Default for ChainDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// The empty-object shape used by the second validation pass. Deserializing
/// it fails for arrays and scalars but accepts any object.
#[derive(Deserialize)]
struct EmptyShape {}

fn validate_json(file: &File) -> Result<(), DetectError> {
    let contents = file.contents()?;

    if serde_json::from_slice::<serde_json::Value>(&contents).is_err() {
        return Err(DetectError::FailedToParse);
    }

    if serde_json::from_slice::<EmptyShape>(&contents).is_err() {
        return Err(DetectError::InvalidInput);
    }

    Ok(())
}

fn validate_yaml(file: &File) -> Result<(), DetectError> {
    let contents = file.contents()?;

    for document in serde_yaml::Deserializer::from_slice(&contents) {
        if serde_yaml::Value::deserialize(document).is_err() {
            return Err(DetectError::FailedToParse);
        }
    }

    for document in serde_yaml::Deserializer::from_slice(&contents) {
        if EmptyShape::deserialize(document).is_err() {
            return Err(DetectError::InvalidInput);
        }
    }

    Ok(())
}
