//! Path scanning: the per-path discovery state machine, depth-bounded
//! directory walking, and hidden-entry exclusion.

use crate::error::{EngineError, ErrorCode, classify_error, classify_warning};
use crate::fs::{Filesystem, PathKind};
use crate::input::{
    ChainDetector, DetectOptions, Detectable, Directory, File, Loader,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of one scan: the loader with every discovered configuration,
/// fatal errors, and non-fatal warnings.
pub struct ScanReport {
    pub loader: Loader,
    pub errors: Vec<EngineError>,
    pub warnings: Vec<EngineError>,
}

/// Discovers IaC configurations under a set of root paths.
pub struct Scanner {
    fs: Arc<dyn Filesystem>,
    /// Maximum directory depth to detect at; 0 means unlimited.
    detection_depth: usize,
    var_file: Option<PathBuf>,
}

impl Scanner {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            detection_depth: 0,
            var_file: None,
        }
    }

    /// Limit detection to entries at most `depth` levels below a scanned
    /// directory. 0 means unlimited.
    pub fn with_detection_depth(mut self, depth: usize) -> Self {
        self.detection_depth = depth;
        self
    }

    /// Pass a variables file to every detection call.
    pub fn with_var_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_file = Some(path.into());
        self
    }

    /// Scan the given root paths.
    ///
    /// Fatal errors are scoped to the path that produced them; multiple
    /// paths can fail independently without stopping the scan. Non-fatal
    /// errors collected during loading come back as warnings.
    pub fn scan(&self, paths: &[PathBuf]) -> ScanReport {
        let mut pass = ScanPass {
            scanner: self,
            loader: Loader::new(ChainDetector::new()),
            errors: Vec::new(),
        };

        for path in paths {
            pass.load_path(path);
        }

        let mut warnings = Vec::new();

        for (path, path_warnings) in pass.loader.errors() {
            for warning in path_warnings {
                warn!(path = %path.display(), %warning, "non-fatal error");

                if let Some(classified) = classify_warning(warning, path) {
                    warnings.push(classified);
                }
            }
        }

        debug!(
            discovered = pass.loader.count(),
            errors = pass.errors.len(),
            warnings = warnings.len(),
            "scan finished",
        );

        ScanReport {
            loader: pass.loader,
            errors: pass.errors,
            warnings,
        }
    }
}

/// Mutable state of one scan invocation. Owned exclusively for its duration;
/// read-only afterwards through the report.
struct ScanPass<'a> {
    scanner: &'a Scanner,
    loader: Loader,
    errors: Vec<EngineError>,
}

impl ScanPass<'_> {
    fn load_path(&mut self, path: &Path) {
        match self.scanner.fs.stat(path) {
            Err(err) => self.errors.push(EngineError::engine(
                err.to_string(),
                ErrorCode::UnableToReadPath,
                path,
            )),
            Ok(PathKind::Directory) => self.load_directory(path),
            Ok(PathKind::File) => self.load_file(path),
        }
    }

    fn load_directory(&mut self, path: &Path) {
        let loader_count_before = self.loader.count();
        let errors_count_before = self.errors.len();

        self.walk_directory(path);

        // If neither count moved, scanning this path made no progress: no
        // valid IaC file was found, and nothing reported an error either.
        // Every other outcome already said something, so report this one
        // scoped to the path.
        if self.loader.count() == loader_count_before && self.errors.len() == errors_count_before {
            self.errors.push(EngineError::engine(
                "no IaC files found",
                ErrorCode::NoLoadableInputs,
                path,
            ));
        }
    }

    fn walk_directory(&mut self, path: &Path) {
        let dir = Directory::new(path, Arc::clone(&self.scanner.fs));

        // Whole-directory shortcut: a directory of .tf files is one logical
        // unit and is not walked further.
        if self.load(&Detectable::Directory(dir.clone())) {
            return;
        }

        let detection_depth = self.scanner.detection_depth;
        let result = dir.walk(&mut |detectable, depth| {
            if detection_depth > 0 && depth > detection_depth {
                return Ok(true);
            }

            if is_hidden(detectable.path()) {
                return Ok(true);
            }

            Ok(self.load(detectable))
        });

        if let Err(err) = result
            && let Some(classified) = classify_error(err, path)
        {
            self.errors.push(classified);
        }
    }

    fn load_file(&mut self, path: &Path) {
        let file = File::new(path, Arc::clone(&self.scanner.fs));
        self.load(&Detectable::File(file));
    }

    fn load(&mut self, detectable: &Detectable) -> bool {
        let options = DetectOptions {
            var_files: self.scanner.var_file.iter().cloned().collect(),
        };

        match self.loader.load(detectable, &options) {
            Ok(loaded) => loaded,
            Err(err) => {
                if let Some(classified) = classify_error(err, detectable.path()) {
                    self.errors.push(classified);
                }
                false
            }
        }
    }
}

/// Whether a path's base name marks it hidden (leading dot, except the
/// single-dot name itself).
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name != "." && name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFilesystem;
    use crate::input::InputType;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> Scanner {
        Scanner::new(Arc::new(OsFilesystem))
    }

    fn scan_one(scanner: &Scanner, path: &Path) -> ScanReport {
        scanner.scan(&[path.to_path_buf()])
    }

    fn write_kubernetes_manifest(path: &Path) {
        fs::write(path, "apiVersion: v1\nkind: Pod\nmetadata:\n  name: app\n").unwrap();
    }

    #[test]
    fn test_directory_with_recognizable_file() {
        let dir = TempDir::new().unwrap();
        write_kubernetes_manifest(&dir.path().join("pod.yaml"));

        let report = scan_one(&scanner(), dir.path());

        assert_eq!(report.loader.count(), 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_empty_directory_reports_no_iac_files_found() {
        let dir = TempDir::new().unwrap();

        let report = scan_one(&scanner(), dir.path());

        assert_eq!(report.loader.count(), 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::NoLoadableInputs));
        assert_eq!(report.errors[0].path(), Some(dir.path()));
    }

    #[test]
    fn test_directory_with_only_unrecognizable_files_reports_no_iac_files_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::write(dir.path().join("notes.txt"), "notes").unwrap();

        let report = scan_one(&scanner(), dir.path());

        assert_eq!(report.loader.count(), 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::NoLoadableInputs));
    }

    #[test]
    fn test_directory_with_broken_file_reports_parse_error_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let report = scan_one(&scanner(), dir.path());

        // The parse error counts as progress: no "no IaC files found".
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::FailedToParseInput));
    }

    #[test]
    fn test_invalid_shape_is_swallowed_and_counts_as_no_progress() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("array.json"), "[1, 2, 3]").unwrap();

        let report = scan_one(&scanner(), dir.path());

        // The invalid-shape sentinel is never surfaced; with nothing else
        // reported, the directory itself errors.
        assert_eq!(report.loader.count(), 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::NoLoadableInputs));
    }

    #[test]
    fn test_hidden_entries_are_not_detected() {
        let dir = TempDir::new().unwrap();
        let hidden_dir = dir.path().join(".git");
        fs::create_dir(&hidden_dir).unwrap();
        write_kubernetes_manifest(&hidden_dir.join("pod.yaml"));
        write_kubernetes_manifest(&dir.path().join(".hidden.yaml"));

        let report = scan_one(&scanner(), dir.path());

        // Only hidden content: nothing detected, so the directory errors.
        assert_eq!(report.loader.count(), 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::NoLoadableInputs));
    }

    #[test]
    fn test_detection_depth_limits_loading() {
        let dir = TempDir::new().unwrap();
        write_kubernetes_manifest(&dir.path().join("top.yaml"));
        let nested = dir.path().join("one").join("two");
        fs::create_dir_all(&nested).unwrap();
        write_kubernetes_manifest(&nested.join("deep.yaml"));

        let report = scan_one(&scanner().with_detection_depth(1), dir.path());
        assert_eq!(report.loader.count(), 1);

        let report = scan_one(&scanner().with_detection_depth(3), dir.path());
        assert_eq!(report.loader.count(), 2);

        let report = scan_one(&scanner(), dir.path());
        assert_eq!(report.loader.count(), 2);
    }

    #[test]
    fn test_unreadable_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let report = scan_one(&scanner(), &missing);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code(), Some(ErrorCode::UnableToReadPath));
        assert_eq!(report.errors[0].path(), Some(missing.as_path()));
    }

    #[test]
    fn test_single_file_path() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("pod.yaml");
        write_kubernetes_manifest(&manifest);

        let report = scan_one(&scanner(), &manifest);

        assert_eq!(report.loader.count(), 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_single_unrecognized_file_is_silent() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "notes").unwrap();

        let report = scan_one(&scanner(), &notes);

        assert_eq!(report.loader.count(), 0);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_terraform_directory_shortcut_loads_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tf"), "resource \"a\" \"b\" {}\n").unwrap();
        fs::write(dir.path().join("outputs.tf"), "output \"x\" {}\n").unwrap();
        let sub = dir.path().join("manifests");
        fs::create_dir(&sub).unwrap();
        write_kubernetes_manifest(&sub.join("pod.yaml"));

        let report = scan_one(&scanner(), dir.path());

        // The whole directory matched as one Terraform unit; it is not
        // walked, so the nested manifest is not loaded separately.
        assert_eq!(report.loader.count(), 1);
        assert_eq!(
            report.loader.configurations()[0].input_type,
            InputType::TerraformConfig
        );
    }

    #[test]
    fn test_multiple_paths_fail_independently() {
        let dir = TempDir::new().unwrap();
        write_kubernetes_manifest(&dir.path().join("pod.yaml"));
        let missing = dir.path().join("missing");

        let report = scanner().scan(&[dir.path().to_path_buf(), missing.clone()]);

        assert_eq!(report.loader.count(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path(), Some(missing.as_path()));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write_kubernetes_manifest(&dir.path().join("pod.yaml"));
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(
            dir.path().join("main.tf"),
            "module \"vpc\" {\n  source = \"./vpc\"\n}\n",
        )
        .unwrap();

        let scanner = scanner();
        let first = scan_one(&scanner, dir.path());
        let second = scan_one(&scanner, dir.path());

        assert_eq!(first.loader.count(), second.loader.count());
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn test_loader_warnings_become_classified_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.tf"),
            "module \"vpc\" {\n  source = \"./vpc\"\n}\n",
        )
        .unwrap();

        let report = scan_one(&scanner(), dir.path());

        assert_eq!(report.loader.count(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            report.warnings[0],
            EngineError::SubmoduleLoading { ref module, .. } if module == "vpc"
        ));
    }

    #[test]
    fn test_var_file_is_recorded_on_states() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tf"), "resource \"a\" \"b\" {}\n").unwrap();

        let report = scan_one(&scanner().with_var_file("prod.tfvars"), dir.path());
        let states = report.loader.to_states();

        assert_eq!(states.len(), 1);
        assert_eq!(states[0].var_files, vec![PathBuf::from("prod.tfvars")]);
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("infra/.git")));
        assert!(is_hidden(Path::new(".hidden.yaml")));
        assert!(!is_hidden(Path::new("infra/visible.yaml")));
        assert!(!is_hidden(Path::new(".")));
    }
}
