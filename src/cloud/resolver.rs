//! Cloud-context resolver construction and the error-capturing wrapper.

use crate::cloud::{
    CloudClient, CloudError, ResolveError, ResourceState, ResourcesQuery, ResourcesResolver,
    ResourcesResult, WILDCARD, scope_matches,
};
use crate::error::{EngineError, ErrorCode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The only environment kind cloud-context evaluation currently supports.
pub const SUPPORTED_ENVIRONMENT_KIND: &str = "aws";

/// Why a resolver could not be constructed. All of these abort the scan
/// before any evaluation is attempted.
#[derive(Debug, Clone, Error)]
pub enum ResolverSetupError {
    #[error("error searching for environment {environment_id}: {source}")]
    EnvironmentLookup {
        environment_id: String,
        source: CloudError,
    },

    #[error("no environment {0}")]
    NoEnvironment(String),

    #[error("found more than one environment {0}")]
    AmbiguousEnvironment(String),

    #[error("unsupported environment {name} ({id}) (kind is {kind})")]
    UnsupportedKind {
        name: String,
        id: String,
        kind: String,
    },
}

/// Build a resource resolver for one cloud environment.
///
/// Requires exactly one environment to match the identifier, and that
/// environment's kind to be supported.
pub async fn new_resources_resolver(
    client: Arc<dyn CloudClient>,
    org_id: &str,
    environment_id: &str,
) -> Result<Arc<dyn ResourcesResolver>, ResolverSetupError> {
    let mut environments = client.environments(org_id, environment_id).await.map_err(
        |source| ResolverSetupError::EnvironmentLookup {
            environment_id: environment_id.to_string(),
            source,
        },
    )?;

    if environments.is_empty() {
        return Err(ResolverSetupError::NoEnvironment(environment_id.to_string()));
    }

    if environments.len() > 1 {
        return Err(ResolverSetupError::AmbiguousEnvironment(
            environment_id.to_string(),
        ));
    }

    let environment = environments.remove(0);

    if environment.kind != SUPPORTED_ENVIRONMENT_KIND {
        return Err(ResolverSetupError::UnsupportedKind {
            name: environment.name,
            id: environment.id,
            kind: environment.kind,
        });
    }

    debug!(
        environment_id = %environment.id,
        kind = %environment.kind,
        "cloud context resolver ready",
    );

    Ok(Arc::new(CloudResourceResolver {
        org_id: org_id.to_string(),
        environment_id: environment.id,
        client,
    }))
}

/// Resolves AWS resources for one environment through the cloud API.
pub struct CloudResourceResolver {
    org_id: String,
    environment_id: String,
    client: Arc<dyn CloudClient>,
}

impl std::fmt::Debug for CloudResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudResourceResolver")
            .field("org_id", &self.org_id)
            .field("environment_id", &self.environment_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourcesResolver for CloudResourceResolver {
    async fn resolve(&self, query: &ResourcesQuery) -> Result<ResourcesResult, ResolveError> {
        let resolver_scope: HashMap<String, String> = HashMap::from([
            ("cloud".to_string(), SUPPORTED_ENVIRONMENT_KIND.to_string()),
            ("region".to_string(), WILDCARD.to_string()),
        ]);

        if !scope_matches(&query.scope, &resolver_scope) {
            return Ok(ResourcesResult::default());
        }

        if query.scope.get("cloud").map(String::as_str) != Some(SUPPORTED_ENVIRONMENT_KIND) {
            return Ok(ResourcesResult::default());
        }

        let resources = self
            .client
            .resources(
                &self.org_id,
                &self.environment_id,
                &query.resource_type,
                "cloud",
            )
            .await
            .map_err(|err| ResolveError(err.to_string()))?;

        Ok(ResourcesResult {
            scope_found: true,
            resources: resources
                .into_iter()
                .map(|resource| ResourceState {
                    id: resource.id,
                    resource_type: resource.resource_type,
                    attributes: resource.state,
                })
                .collect(),
        })
    }
}

/// Wraps a resolver so resolution errors are captured out-of-band instead of
/// aborting evaluation.
///
/// The capture slot holds one error. A send that finds the slot full is
/// discarded: only the first cloud-context error per scan is surfaced, and a
/// resolver call never blocks on error reporting. The underlying error still
/// propagates to the evaluation engine.
#[derive(Debug)]
pub struct ErrorCapturingResolver {
    inner: Arc<dyn ResourcesResolver>,
    errors: mpsc::Sender<EngineError>,
}

impl ErrorCapturingResolver {
    pub fn new(inner: Arc<dyn ResourcesResolver>) -> (Self, mpsc::Receiver<EngineError>) {
        let (errors, receiver) = mpsc::channel(1);

        (Self { inner, errors }, receiver)
    }
}

#[async_trait]
impl ResourcesResolver for ErrorCapturingResolver {
    async fn resolve(&self, query: &ResourcesQuery) -> Result<ResourcesResult, ResolveError> {
        let result = self.inner.resolve(query).await;

        if let Err(err) = &result {
            warn!(resource_type = %query.resource_type, %err, "cloud resource fetch failed");

            let classified = EngineError::engine(
                format!("An error occurred fetching cloud resources: {err}"),
                ErrorCode::ResourcesResolverError,
                PathBuf::new(),
            );

            // A full slot means an earlier error is already pending.
            let _ = self.errors.try_send(classified);
        }

        result
    }
}
