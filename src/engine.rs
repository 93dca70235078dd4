//! Scan orchestration: input loading, dual policy evaluation, and
//! cloud-context suppression.

use crate::cloud::{CloudClient, ErrorCapturingResolver, ResourcesResolver, new_resources_resolver};
use crate::error::{EngineError, ErrorCode, classify_error};
use crate::eval::suppression::{SuppressionMap, calculate_suppression_info};
use crate::eval::{EvalRequest, PolicyEvaluator};
use crate::fs::Filesystem;
use crate::results::Results;
use crate::scanner::Scanner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Configuration for one run. Consumed, not owned: the caller decides where
/// these values come from.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Root paths to scan.
    pub paths: Vec<PathBuf>,
    /// Rule ids to evaluate; empty means all rules.
    pub rule_ids: Vec<String>,
    /// Maximum detection depth below a scanned directory; 0 means unlimited.
    pub detection_depth: usize,
    /// Variables file passed to every detection call.
    pub var_file: Option<PathBuf>,
    /// Organization the cloud environment belongs to.
    pub org_id: String,
    /// Cloud environment identifier; enables cloud-context evaluation.
    pub cloud_environment: Option<String>,
    /// Cloud API client used to construct the resource resolver.
    pub cloud_client: Option<Arc<dyn CloudClient>>,
}

/// The outcome of one run.
///
/// `results` is `None` when the run failed as a whole: nothing was loadable,
/// an evaluation pass failed, or a cloud-context error made the results
/// untrustworthy. `suppressed_results` is `None` whenever no cloud resolver
/// was configured, so an absent map is distinguishable from an empty one.
pub struct RunOutcome {
    pub results: Option<Results>,
    pub suppressed_results: Option<SuppressionMap>,
    pub errors: Vec<EngineError>,
    pub warnings: Vec<EngineError>,
}

impl RunOutcome {
    fn failed(errors: Vec<EngineError>, warnings: Vec<EngineError>) -> Self {
        Self {
            results: None,
            suppressed_results: None,
            errors,
            warnings,
        }
    }
}

/// Scans a set of paths, evaluates the loaded inputs, and reports findings
/// together with classified errors and warnings.
pub struct Engine {
    evaluator: Arc<dyn PolicyEvaluator>,
    fs: Arc<dyn Filesystem>,
}

impl Engine {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>, fs: Arc<dyn Filesystem>) -> Self {
        Self { evaluator, fs }
    }

    /// Run a full scan.
    ///
    /// When a cloud environment is configured, a second, resolver-free
    /// evaluation runs concurrently with the primary one; diffing the two
    /// result sets yields the suppressed results. Both passes complete
    /// before the diff. Dropping the returned future cancels both.
    pub async fn run(&self, options: &RunOptions) -> RunOutcome {
        // Initialization errors are advisory: the engine keeps running
        // whichever rule bundles did initialize.
        let mut errors: Vec<EngineError> = self
            .evaluator
            .initialization_errors()
            .into_iter()
            .filter_map(|err| classify_error(err, Path::new("")))
            .collect();

        let resolver = match self.make_resolver(options).await {
            Ok(resolver) => resolver,
            Err(err) => {
                errors.push(err);
                return RunOutcome::failed(errors, Vec::new());
            }
        };

        let mut scanner = Scanner::new(Arc::clone(&self.fs))
            .with_detection_depth(options.detection_depth);
        if let Some(var_file) = &options.var_file {
            scanner = scanner.with_var_file(var_file);
        }

        let report = scanner.scan(&options.paths);
        errors.extend(report.errors);
        let warnings = report.warnings;

        let inputs = report.loader.to_states();
        if inputs.is_empty() {
            return RunOutcome {
                results: None,
                suppressed_results: None,
                errors,
                warnings,
            };
        }

        debug!(inputs = inputs.len(), "starting policy evaluation");

        let Some(resolver) = resolver else {
            let request = EvalRequest {
                inputs: &inputs,
                resolver: None,
                rule_ids: &options.rule_ids,
            };

            return match self.evaluator.evaluate(request).await {
                Ok(results) => RunOutcome {
                    results: Some(results),
                    suppressed_results: None,
                    errors,
                    warnings,
                },
                Err(err) => {
                    if let Some(classified) = classify_error(err, Path::new("")) {
                        errors.push(classified);
                    }
                    RunOutcome::failed(errors, warnings)
                }
            };
        };

        let (wrapper, mut resolver_errors) = ErrorCapturingResolver::new(resolver);
        let wrapper: Arc<dyn ResourcesResolver> = Arc::new(wrapper);

        // Fork-join: the resolver-free pass runs concurrently with the
        // primary one, and suppression is computed only once both are done.
        let primary = self.evaluator.evaluate(EvalRequest {
            inputs: &inputs,
            resolver: Some(Arc::clone(&wrapper)),
            rule_ids: &options.rule_ids,
        });
        let secondary = self.evaluator.evaluate(EvalRequest {
            inputs: &inputs,
            resolver: None,
            rule_ids: &options.rule_ids,
        });

        let (primary, secondary) = tokio::join!(primary, secondary);

        let (with_resolver, without_resolver) = match (primary, secondary) {
            (Ok(with_resolver), Ok(without_resolver)) => (with_resolver, without_resolver),
            (Err(err), _) | (_, Err(err)) => {
                // Partial suppression data is worse than none; a failed or
                // cancelled pass fails the run.
                if let Some(classified) = classify_error(err, Path::new("")) {
                    errors.push(classified);
                }
                return RunOutcome::failed(errors, warnings);
            }
        };

        let suppressed_results = calculate_suppression_info(&with_resolver, &without_resolver);

        // Cloud-context errors cannot be attributed to a path the way loader
        // errors can, so the first captured one fails the whole run and the
        // results are discarded.
        if let Ok(err) = resolver_errors.try_recv() {
            errors.push(err);
            return RunOutcome::failed(errors, warnings);
        }

        RunOutcome {
            results: Some(with_resolver),
            suppressed_results,
            errors,
            warnings,
        }
    }

    /// Construct the cloud-context resolver, if one is configured. A
    /// construction failure is fatal for the whole run and happens before
    /// any evaluation.
    async fn make_resolver(
        &self,
        options: &RunOptions,
    ) -> Result<Option<Arc<dyn ResourcesResolver>>, EngineError> {
        let Some(environment_id) = &options.cloud_environment else {
            return Ok(None);
        };

        let Some(client) = &options.cloud_client else {
            return Err(EngineError::engine(
                "An error occurred preparing cloud context: no cloud API client configured",
                ErrorCode::FailedToMakeResourcesResolvers,
                PathBuf::new(),
            ));
        };

        match new_resources_resolver(Arc::clone(client), &options.org_id, environment_id).await {
            Ok(resolver) => Ok(Some(resolver)),
            Err(err) => Err(EngineError::engine(
                format!("An error occurred preparing cloud context: {err}"),
                ErrorCode::FailedToMakeResourcesResolvers,
                PathBuf::new(),
            )),
        }
    }
}
