//! The cloud API boundary: environment and resource models, the client
//! trait, and the resource-resolver contract used for cloud-context
//! evaluation.

pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use resolver::{
    CloudResourceResolver, ErrorCapturingResolver, ResolverSetupError, new_resources_resolver,
};

/// The scope value that matches any region.
pub const WILDCARD: &str = "*";

/// A cloud environment registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    /// The environment kind (e.g. "aws"); gates resolver construction.
    pub kind: String,
}

/// A live resource returned by the cloud API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    pub id: String,
    pub resource_type: String,
    /// The captured resource state, as reported by the platform.
    pub state: serde_json::Value,
}

/// An error from the cloud API client.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CloudError(pub String);

/// Client for the platform's cloud API.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// List the environments matching an environment identifier within an
    /// organization.
    async fn environments(
        &self,
        org_id: &str,
        environment_id: &str,
    ) -> Result<Vec<Environment>, CloudError>;

    /// List the resources of an environment, filtered by resource type and
    /// kind.
    async fn resources(
        &self,
        org_id: &str,
        environment_id: &str,
        resource_type: &str,
        kind: &str,
    ) -> Result<Vec<ResourceObject>, CloudError>;
}

/// A resource query issued by the evaluation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcesQuery {
    pub resource_type: String,
    pub scope: HashMap<String, String>,
}

/// A normalized resource state handed back to the evaluation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub resource_type: String,
    pub attributes: serde_json::Value,
}

/// The answer to a resource query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesResult {
    /// Whether the query's scope is one this resolver can answer for.
    pub scope_found: bool,
    pub resources: Vec<ResourceState>,
}

/// An error from a resource resolution call.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ResolveError(pub String);

/// Resolves live cloud resources for the evaluation engine.
#[async_trait]
pub trait ResourcesResolver: Send + Sync + std::fmt::Debug {
    async fn resolve(&self, query: &ResourcesQuery) -> Result<ResourcesResult, ResolveError>;
}

/// Check a query scope against a resolver scope. Every resolver scope entry
/// must be matched exactly by the query, except the wildcard token, which
/// matches any value.
pub fn scope_matches(
    query_scope: &HashMap<String, String>,
    resolver_scope: &HashMap<String, String>,
) -> bool {
    resolver_scope.iter().all(|(key, expected)| {
        expected == WILDCARD || query_scope.get(key).is_some_and(|value| value == expected)
    })
}
