//! The classified error taxonomy and the classifier that maps raw detection
//! and evaluation errors onto it.
//!
//! Raw errors from the input and evaluation layers are opaque to callers.
//! Classification turns them into typed, path-scoped `EngineError` values
//! with stable codes, so downstream consumers can key behavior off the
//! variant instead of the message text.

use crate::eval::EvalError;
use crate::input::{DetectError, DetectWarning};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stable identifiers for the known error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    NoLoadableInputs,
    UnableToRecognizeInputType,
    UnsupportedInputType,
    UnableToResolveLocation,
    UnrecognizedFileExtension,
    FailedToParseInput,
    InvalidInput,
    UnableToReadFile,
    UnableToReadDir,
    FailedToLoadRuleApi,
    FailedToLoadRules,
    FailedToCompile,
    UnableToReadPath,
    FailedToMakeResourcesResolvers,
    ResourcesResolverError,
    SubmoduleLoadingError,
    MissingRemoteSubmodulesError,
    EvaluationError,
    MissingTermError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoLoadableInputs => "no-loadable-inputs",
            ErrorCode::UnableToRecognizeInputType => "unable-to-recognize-input-type",
            ErrorCode::UnsupportedInputType => "unsupported-input-type",
            ErrorCode::UnableToResolveLocation => "unable-to-resolve-location",
            ErrorCode::UnrecognizedFileExtension => "unrecognized-file-extension",
            ErrorCode::FailedToParseInput => "failed-to-parse-input",
            ErrorCode::InvalidInput => "invalid-input",
            ErrorCode::UnableToReadFile => "unable-to-read-file",
            ErrorCode::UnableToReadDir => "unable-to-read-dir",
            ErrorCode::FailedToLoadRuleApi => "failed-to-load-rule-api",
            ErrorCode::FailedToLoadRules => "failed-to-load-rules",
            ErrorCode::FailedToCompile => "failed-to-compile",
            ErrorCode::UnableToReadPath => "unable-to-read-path",
            ErrorCode::FailedToMakeResourcesResolvers => "failed-to-make-resources-resolvers",
            ErrorCode::ResourcesResolverError => "resources-resolver-error",
            ErrorCode::SubmoduleLoadingError => "submodule-loading-error",
            ErrorCode::MissingRemoteSubmodulesError => "missing-remote-submodules-error",
            ErrorCode::EvaluationError => "evaluation-error",
            ErrorCode::MissingTermError => "missing-term-error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fmt_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        String::new()
    } else {
        format!(": {}", path.display())
    }
}

/// A classified error or warning, as returned to the caller.
///
/// The `Engine` variant covers the generic taxonomy entries; the richer
/// variants carry structured context for the four warning shapes. Whether a
/// value is fatal or advisory depends on where it originated, not on the
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine error {code}: {message}{}", fmt_path(.path))]
    Engine {
        message: String,
        code: ErrorCode,
        path: PathBuf,
    },

    #[error("{message}")]
    SubmoduleLoading {
        message: String,
        path: PathBuf,
        module: String,
    },

    #[error("{message}")]
    MissingRemoteSubmodules {
        message: String,
        path: PathBuf,
        dir: PathBuf,
        missing_modules: Vec<String>,
    },

    #[error("{message}")]
    Evaluation {
        message: String,
        path: PathBuf,
        expressions: Vec<String>,
    },

    #[error("{message}")]
    MissingTerm {
        message: String,
        path: PathBuf,
        term: String,
    },

    /// An error the classifier has no taxonomy entry for. Passed through so
    /// it is never silently swallowed.
    #[error("{0}")]
    Uncategorized(String),
}

impl EngineError {
    pub fn engine(message: impl Into<String>, code: ErrorCode, path: impl Into<PathBuf>) -> Self {
        EngineError::Engine {
            message: message.into(),
            code,
            path: path.into(),
        }
    }

    /// The taxonomy code of this error, if it has one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            EngineError::Engine { code, .. } => Some(*code),
            EngineError::SubmoduleLoading { .. } => Some(ErrorCode::SubmoduleLoadingError),
            EngineError::MissingRemoteSubmodules { .. } => {
                Some(ErrorCode::MissingRemoteSubmodulesError)
            }
            EngineError::Evaluation { .. } => Some(ErrorCode::EvaluationError),
            EngineError::MissingTerm { .. } => Some(ErrorCode::MissingTermError),
            EngineError::Uncategorized(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            EngineError::Engine { path, .. }
            | EngineError::SubmoduleLoading { path, .. }
            | EngineError::MissingRemoteSubmodules { path, .. }
            | EngineError::Evaluation { path, .. }
            | EngineError::MissingTerm { path, .. } => Some(path),
            EngineError::Uncategorized(_) => None,
        }
    }
}

/// A raw error from the detection or evaluation layer, before classification.
#[derive(Debug, Error)]
pub enum RawError {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Map a raw error to its classified form.
///
/// Returns `None` only for the one sentinel that is deliberately not
/// surfaced: `InvalidInput` marks a recognized-but-inapplicable shape that
/// the syntax pre-validation already reports more precisely. Errors with no
/// taxonomy entry pass through as `Uncategorized`.
pub fn classify_error(err: impl Into<RawError>, path: &Path) -> Option<EngineError> {
    let err = err.into();

    if matches!(err, RawError::Detect(DetectError::InvalidInput)) {
        return None;
    }

    let message = err.to_string();

    match error_code(&err) {
        Some(code) => Some(EngineError::Engine {
            message,
            code,
            path: path.to_path_buf(),
        }),
        None => Some(EngineError::Uncategorized(message)),
    }
}

fn error_code(err: &RawError) -> Option<ErrorCode> {
    match err {
        RawError::Detect(detect) => match detect {
            DetectError::UnsupportedInputType => Some(ErrorCode::UnsupportedInputType),
            DetectError::UnableToResolveLocation => Some(ErrorCode::UnableToResolveLocation),
            DetectError::UnrecognizedFileExtension => Some(ErrorCode::UnrecognizedFileExtension),
            DetectError::FailedToParse => Some(ErrorCode::FailedToParseInput),
            DetectError::InvalidInput => Some(ErrorCode::InvalidInput),
            DetectError::UnableToReadFile { .. } => Some(ErrorCode::UnableToReadFile),
            DetectError::UnableToReadDir { .. } => Some(ErrorCode::UnableToReadDir),
        },
        RawError::Eval(eval) => match eval {
            EvalError::FailedToLoadRuleApi(_) => Some(ErrorCode::FailedToLoadRuleApi),
            EvalError::FailedToLoadRules(_) => Some(ErrorCode::FailedToLoadRules),
            EvalError::FailedToCompile(_) => Some(ErrorCode::FailedToCompile),
            EvalError::Cancelled | EvalError::Other(_) => None,
        },
    }
}

/// Map a non-fatal loader warning to its classified form.
///
/// Only the four rich shapes are surfaced; anything else is dropped.
pub fn classify_warning(warning: &DetectWarning, path: &Path) -> Option<EngineError> {
    match warning {
        DetectWarning::SubmoduleLoading { module } => Some(EngineError::SubmoduleLoading {
            message: warning.to_string(),
            path: path.to_path_buf(),
            module: module.clone(),
        }),
        DetectWarning::MissingRemoteSubmodules {
            dir,
            missing_modules,
        } => Some(EngineError::MissingRemoteSubmodules {
            message: warning.to_string(),
            path: path.to_path_buf(),
            dir: dir.clone(),
            missing_modules: missing_modules.clone(),
        }),
        DetectWarning::Evaluation { diagnostics } => Some(EngineError::Evaluation {
            message: warning.to_string(),
            path: path.to_path_buf(),
            expressions: diagnostics
                .iter()
                .map(|diag| format!("{}: {}", diag.subject, diag.summary))
                .collect(),
        }),
        DetectWarning::MissingTerm { term } => Some(EngineError::MissingTerm {
            message: warning.to_string(),
            path: path.to_path_buf(),
            term: term.clone(),
        }),
        DetectWarning::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Diagnostic;
    use std::io;

    #[test]
    fn test_engine_error_display_with_path() {
        let err = EngineError::engine("no IaC files found", ErrorCode::NoLoadableInputs, "infra");
        assert_eq!(
            err.to_string(),
            "engine error no-loadable-inputs: no IaC files found: infra"
        );
    }

    #[test]
    fn test_engine_error_display_without_path() {
        let err = EngineError::engine(
            "An error occurred fetching cloud resources: timeout",
            ErrorCode::ResourcesResolverError,
            PathBuf::new(),
        );
        assert_eq!(
            err.to_string(),
            "engine error resources-resolver-error: An error occurred fetching cloud resources: timeout"
        );
    }

    #[test]
    fn test_classify_known_detect_errors() {
        let classified = classify_error(DetectError::FailedToParse, Path::new("a.json")).unwrap();
        assert_eq!(classified.code(), Some(ErrorCode::FailedToParseInput));
        assert_eq!(classified.path(), Some(Path::new("a.json")));

        let classified = classify_error(
            DetectError::UnableToReadFile {
                path: PathBuf::from("a.json"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
            Path::new("a.json"),
        )
        .unwrap();
        assert_eq!(classified.code(), Some(ErrorCode::UnableToReadFile));
    }

    #[test]
    fn test_classify_known_eval_errors() {
        let classified = classify_error(
            EvalError::FailedToLoadRules("bad bundle".to_string()),
            Path::new(""),
        )
        .unwrap();

        assert_eq!(classified.code(), Some(ErrorCode::FailedToLoadRules));
        assert_eq!(classified.path(), Some(Path::new("")));
    }

    #[test]
    fn test_invalid_input_is_ignored() {
        assert!(classify_error(DetectError::InvalidInput, Path::new("a.json")).is_none());
    }

    #[test]
    fn test_unknown_error_passes_through_uncategorized() {
        let classified = classify_error(
            EvalError::Other("something odd".to_string()),
            Path::new("a.json"),
        )
        .unwrap();

        assert_eq!(classified, EngineError::Uncategorized("something odd".to_string()));
        assert_eq!(classified.code(), None);
    }

    #[test]
    fn test_classify_warning_submodule_loading() {
        let warning = DetectWarning::SubmoduleLoading {
            module: "vpc".to_string(),
        };
        let classified = classify_warning(&warning, Path::new("infra")).unwrap();

        assert!(matches!(
            classified,
            EngineError::SubmoduleLoading { ref module, .. } if module == "vpc"
        ));
        assert_eq!(classified.code(), Some(ErrorCode::SubmoduleLoadingError));
    }

    #[test]
    fn test_classify_warning_missing_remote_submodules() {
        let warning = DetectWarning::MissingRemoteSubmodules {
            dir: PathBuf::from("infra/.terraform/modules"),
            missing_modules: vec!["vpc".to_string(), "eks".to_string()],
        };
        let classified = classify_warning(&warning, Path::new("infra")).unwrap();

        assert!(matches!(
            classified,
            EngineError::MissingRemoteSubmodules { ref missing_modules, .. }
                if missing_modules.len() == 2
        ));
    }

    #[test]
    fn test_classify_warning_evaluation_formats_expressions() {
        let warning = DetectWarning::Evaluation {
            diagnostics: vec![Diagnostic {
                subject: "main.tf:3".to_string(),
                summary: "undefined variable".to_string(),
            }],
        };

        let Some(EngineError::Evaluation { expressions, .. }) =
            classify_warning(&warning, Path::new("infra"))
        else {
            panic!("expected an evaluation warning");
        };

        assert_eq!(expressions, vec!["main.tf:3: undefined variable".to_string()]);
    }

    #[test]
    fn test_classify_warning_missing_term() {
        let warning = DetectWarning::MissingTerm {
            term: "var.region".to_string(),
        };
        let classified = classify_warning(&warning, Path::new("infra")).unwrap();

        assert!(matches!(
            classified,
            EngineError::MissingTerm { ref term, .. } if term == "var.region"
        ));
    }

    #[test]
    fn test_classify_warning_other_is_dropped() {
        let warning = DetectWarning::Other("unexpected".to_string());
        assert!(classify_warning(&warning, Path::new("infra")).is_none());
    }
}
