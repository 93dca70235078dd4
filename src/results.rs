//! Evaluation result models.
//!
//! The rule engine produces these; this crate treats them as opaque beyond
//! the shape needed to diff two result sets by (rule id, resource id, input
//! fingerprint).

use crate::input::InputState;
use serde::{Deserialize, Serialize};

/// The full output of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub results: Vec<InputResults>,
}

/// All rule results produced for a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputResults {
    pub input: InputState,
    pub rule_results: Vec<RuleResults>,
}

/// The results of one rule across the resources of an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResults {
    pub id: String,
    pub results: Vec<RuleResult>,
}

/// The outcome of one rule on one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub resource_id: String,
    pub passed: bool,
}
