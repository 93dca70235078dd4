//! Suppression computation: diffing the with-resolver and without-resolver
//! result sets to find results that passed only because cloud-context data
//! was present.

use crate::input::InputState;
use crate::results::{InputResults, Results, RuleResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Rule id → resource ids that passed only with cloud context.
pub type SuppressionMap = HashMap<String, Vec<String>>;

/// Diff two result sets over the same inputs.
///
/// A (rule, resource) pair is suppressed when it passed with the resolver
/// and the matching result without the resolver failed. A pass with no match
/// in the resolver-free set is not suppression; there is nothing to compare
/// against. Returns `None` instead of an empty map, so callers never emit an
/// empty suppression block.
pub fn calculate_suppression_info(
    with_resolver: &Results,
    without_resolver: &Results,
) -> Option<SuppressionMap> {
    let mut suppressions: Option<SuppressionMap> = None;

    for input_results in &with_resolver.results {
        for rule_results in &input_results.rule_results {
            for rule_result in &rule_results.results {
                let Some(result_without_resolver) = find_rule_result(
                    &rule_results.id,
                    &rule_result.resource_id,
                    &input_results.input,
                    &without_resolver.results,
                ) else {
                    continue;
                };

                let passed_only_with_resolver =
                    rule_result.passed && !result_without_resolver.passed;
                if !passed_only_with_resolver {
                    continue;
                }

                suppressions
                    .get_or_insert_with(HashMap::new)
                    .entry(rule_results.id.clone())
                    .or_default()
                    .push(rule_result.resource_id.clone());
            }
        }
    }

    suppressions
}

/// Find the rule result for (rule id, resource id) on the input matching the
/// given one, pairing inputs across passes by their meta fingerprint.
fn find_rule_result<'a>(
    rule_id: &str,
    resource_id: &str,
    input: &InputState,
    results: &'a [InputResults],
) -> Option<&'a RuleResult> {
    let input_fingerprint = fingerprint(&input.meta);

    results
        .iter()
        .filter(|candidate| fingerprint(&candidate.input.meta) == input_fingerprint)
        .flat_map(|candidate| &candidate.rule_results)
        .filter(|rule_results| rule_results.id == rule_id)
        .flat_map(|rule_results| &rule_results.results)
        .find(|result| result.resource_id == resource_id)
}

/// Content hash of an input's metadata. The fingerprint covers only the
/// metadata, not the document body: two inputs that share metadata hash
/// alike, and results for them pair up across passes accordingly.
pub(crate) fn fingerprint(meta: &serde_json::Value) -> String {
    let serialized = serde_json::to_vec(meta).expect("JSON value serialization cannot fail");

    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    format!("{:x}", hasher.finalize())
}
