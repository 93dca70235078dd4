//! The boundary to the external rule-evaluation engine.

pub mod suppression;

use crate::cloud::ResourcesResolver;
use crate::input::InputState;
use crate::results::Results;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a policy evaluator.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("failed to load rule API: {0}")]
    FailedToLoadRuleApi(String),

    #[error("failed to load rules: {0}")]
    FailedToLoadRules(String),

    #[error("failed to compile rules: {0}")]
    FailedToCompile(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// One evaluation request: the loaded inputs, an optional cloud-context
/// resolver, and an optional rule-id filter (empty means all rules).
pub struct EvalRequest<'a> {
    pub inputs: &'a [InputState],
    pub resolver: Option<Arc<dyn ResourcesResolver>>,
    pub rule_ids: &'a [String],
}

/// The external rule-evaluation engine.
///
/// Implementations evaluate every configured rule against the given inputs
/// and report per-resource pass/fail outcomes. An implementation that
/// observes cancellation returns `EvalError::Cancelled` rather than partial
/// results.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, request: EvalRequest<'_>) -> Result<Results, EvalError>;

    /// Errors from engine initialization (e.g. rule bundles that failed to
    /// load). The engine keeps running the bundles that did initialize, so
    /// these are advisory.
    fn initialization_errors(&self) -> Vec<EvalError> {
        Vec::new()
    }
}
