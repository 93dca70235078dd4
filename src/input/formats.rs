//! The fixed set of format delegates.
//!
//! Delegates recognize the shape of an input and load it into a generic
//! document; they do not interpret the configuration language itself. That
//! is the evaluation engine's job.

use crate::fs::{Filesystem, PathKind};
use crate::input::{
    DetectError, DetectOptions, DetectWarning, Detector, Directory, File, InputType,
    LoadedConfiguration,
};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Parse a file into one or more generic JSON documents, according to its
/// extension. YAML multi-document streams yield one document per entry.
fn parse_documents(file: &File) -> Result<Vec<serde_json::Value>, DetectError> {
    let contents = file.contents()?;

    match file.extension().as_deref() {
        Some("json") => {
            let document =
                serde_json::from_slice(&contents).map_err(|_| DetectError::FailedToParse)?;
            Ok(vec![document])
        }
        Some("yaml") | Some("yml") => {
            let mut documents = Vec::new();

            for document in serde_yaml::Deserializer::from_slice(&contents) {
                let value = serde_yaml::Value::deserialize(document)
                    .map_err(|_| DetectError::FailedToParse)?;
                documents.push(yaml_to_json(value));
            }

            Ok(documents)
        }
        _ => Err(DetectError::UnrecognizedFileExtension),
    }
}

/// Convert a YAML value to its JSON equivalent. YAML tags (CloudFormation's
/// `!Ref` and friends) are unwrapped to their inner value; non-string mapping
/// keys are rendered as strings.
fn yaml_to_json(value: serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = serde_json::Map::new();

            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                object.insert(key, yaml_to_json(value));
            }

            serde_json::Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// CloudFormation templates: a single document with a `Resources` object.
pub struct CfnDetector;

impl Detector for CfnDetector {
    fn name(&self) -> &'static str {
        "cloudformation"
    }

    fn detect_file(
        &self,
        file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        let mut documents = parse_documents(file)?;

        if documents.len() != 1 {
            return Ok(None);
        }

        let document = documents.remove(0);
        let Some(object) = document.as_object() else {
            return Err(DetectError::InvalidInput);
        };

        match object.get("Resources") {
            Some(resources) if resources.is_object() => Ok(Some(
                LoadedConfiguration::new(InputType::CloudFormation, file.path())
                    .with_document(document),
            )),
            Some(_) => Err(DetectError::InvalidInput),
            None => Ok(None),
        }
    }
}

/// Kubernetes manifests: YAML documents that all carry `apiVersion` and
/// `kind`.
pub struct KubernetesDetector;

impl Detector for KubernetesDetector {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    fn detect_file(
        &self,
        file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        if !matches!(file.extension().as_deref(), Some("yaml") | Some("yml")) {
            return Err(DetectError::UnrecognizedFileExtension);
        }

        let documents: Vec<_> = parse_documents(file)?
            .into_iter()
            .filter(|doc| !doc.is_null())
            .collect();

        if documents.is_empty() {
            return Ok(None);
        }

        let all_manifests = documents.iter().all(|doc| {
            doc.as_object().is_some_and(|object| {
                object.get("apiVersion").is_some_and(|v| v.is_string())
                    && object.get("kind").is_some_and(|v| v.is_string())
            })
        });

        if !all_manifests {
            return Ok(None);
        }

        let document = if documents.len() == 1 {
            documents.into_iter().next().unwrap_or_default()
        } else {
            serde_json::Value::Array(documents)
        };

        Ok(Some(
            LoadedConfiguration::new(InputType::Kubernetes, file.path()).with_document(document),
        ))
    }
}

/// Terraform plan exports (`terraform show -json`).
pub struct TfPlanDetector;

impl Detector for TfPlanDetector {
    fn name(&self) -> &'static str {
        "terraform-plan"
    }

    fn detect_file(
        &self,
        file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        if file.extension().as_deref() != Some("json") {
            return Err(DetectError::UnrecognizedFileExtension);
        }

        let mut documents = parse_documents(file)?;
        let document = documents.remove(0);
        let Some(object) = document.as_object() else {
            return Err(DetectError::InvalidInput);
        };

        if object.contains_key("planned_values") || object.contains_key("resource_changes") {
            Ok(Some(
                LoadedConfiguration::new(InputType::TerraformPlan, file.path())
                    .with_document(document),
            ))
        } else {
            Ok(None)
        }
    }
}

/// Terraform state files.
pub struct TfStateDetector;

impl Detector for TfStateDetector {
    fn name(&self) -> &'static str {
        "terraform-state"
    }

    fn detect_file(
        &self,
        file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        if file.extension().as_deref() != Some("json") {
            return Err(DetectError::UnrecognizedFileExtension);
        }

        let mut documents = parse_documents(file)?;
        let document = documents.remove(0);
        let Some(object) = document.as_object() else {
            return Err(DetectError::InvalidInput);
        };

        let is_state = object.contains_key("lineage")
            || (object.contains_key("serial") && object.contains_key("version"));

        if is_state {
            Ok(Some(
                LoadedConfiguration::new(InputType::TerraformState, file.path())
                    .with_document(document),
            ))
        } else {
            Ok(None)
        }
    }
}

/// Azure Resource Manager templates, recognized by their `$schema`.
pub struct ArmDetector;

impl Detector for ArmDetector {
    fn name(&self) -> &'static str {
        "arm"
    }

    fn detect_file(
        &self,
        file: &File,
        _options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        if file.extension().as_deref() != Some("json") {
            return Err(DetectError::UnrecognizedFileExtension);
        }

        let mut documents = parse_documents(file)?;
        let document = documents.remove(0);
        let Some(object) = document.as_object() else {
            return Err(DetectError::InvalidInput);
        };

        let is_arm = object
            .get("$schema")
            .and_then(|schema| schema.as_str())
            .is_some_and(|schema| schema.to_ascii_lowercase().contains("deploymenttemplate"));

        if is_arm {
            Ok(Some(
                LoadedConfiguration::new(InputType::Arm, file.path()).with_document(document),
            ))
        } else {
            Ok(None)
        }
    }
}

/// Terraform HCL sources: single `.tf` files, or a directory of `.tf` files
/// treated as one logical configuration.
pub struct TfDetector;

impl Detector for TfDetector {
    fn name(&self) -> &'static str {
        "terraform"
    }

    fn detect_file(
        &self,
        file: &File,
        options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        if file.extension().as_deref() != Some("tf") {
            return Err(DetectError::UnrecognizedFileExtension);
        }

        let contents = file.contents()?;
        let source = String::from_utf8_lossy(&contents);
        let module_dir = file.path().parent().unwrap_or(Path::new("."));
        let warnings = scan_module_references(&source, module_dir, file.filesystem());

        Ok(Some(
            LoadedConfiguration::new(InputType::TerraformConfig, file.path())
                .with_var_files(options.var_files.clone())
                .with_warnings(warnings),
        ))
    }

    fn detect_directory(
        &self,
        dir: &Directory,
        options: &DetectOptions,
    ) -> Result<Option<LoadedConfiguration>, DetectError> {
        let mut tf_files = Vec::new();

        for entry in dir.entries()? {
            let is_tf = entry
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("tf"));

            if is_tf && dir.filesystem().stat(&entry).ok() == Some(PathKind::File) {
                tf_files.push(entry);
            }
        }

        if tf_files.is_empty() {
            return Ok(None);
        }

        let mut warnings = Vec::new();

        for tf_file in &tf_files {
            let file = File::new(tf_file, Arc::clone(dir.filesystem()));
            let contents = file.contents()?;
            let source = String::from_utf8_lossy(&contents);
            warnings.extend(scan_module_references(
                &source,
                dir.path(),
                dir.filesystem(),
            ));
        }

        Ok(Some(
            LoadedConfiguration::new(InputType::TerraformConfig, dir.path())
                .with_files(tf_files)
                .with_var_files(options.var_files.clone())
                .with_warnings(warnings),
        ))
    }
}

static MODULE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"module\s+"([^"]+)"\s*\{[^}]*?source\s*=\s*"([^"]+)""#).unwrap()
});

/// Best-effort scan for `module` blocks whose sources are not present on
/// disk. Local path sources are checked directly; registry and git sources
/// are expected under the `.terraform/modules` cache.
fn scan_module_references(
    source: &str,
    dir: &Path,
    fs: &Arc<dyn Filesystem>,
) -> Vec<DetectWarning> {
    let mut warnings = Vec::new();
    let mut missing_remote = Vec::new();

    for captures in MODULE_REFERENCE.captures_iter(source) {
        let module = captures[1].to_string();
        let module_source = &captures[2];

        if module_source.starts_with("./") || module_source.starts_with("../") {
            if fs.stat(&dir.join(module_source)).is_err() {
                warnings.push(DetectWarning::SubmoduleLoading { module });
            }
        } else if fs
            .stat(&dir.join(".terraform").join("modules").join(&module))
            .is_err()
        {
            missing_remote.push(module);
        }
    }

    if !missing_remote.is_empty() {
        warnings.push(DetectWarning::MissingRemoteSubmodules {
            dir: dir.join(".terraform").join("modules"),
            missing_modules: missing_remote,
        });
    }

    warnings
}
