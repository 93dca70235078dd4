//! Discovery and scan orchestration for infrastructure-as-code
//! configurations.
//!
//! The pipeline: the [`scanner::Scanner`] walks the requested paths and
//! detects IaC inputs (Terraform, CloudFormation, Kubernetes, ARM); the
//! [`engine::Engine`] evaluates the loaded inputs against an external rule
//! engine and, when a cloud environment is configured, runs a second
//! resolver-free evaluation concurrently to compute which findings live
//! cloud state suppressed. Every failure along the way is classified into
//! the stable taxonomy in [`error`].

pub mod cloud;
pub mod engine;
pub mod error;
pub mod eval;
pub mod fs;
pub mod input;
pub mod results;
pub mod scanner;

pub use cloud::{
    CloudClient, CloudError, Environment, ResolveError, ResourceObject, ResourceState,
    ResourcesQuery, ResourcesResolver, ResourcesResult,
};
pub use engine::{Engine, RunOptions, RunOutcome};
pub use error::{EngineError, ErrorCode, classify_error, classify_warning};
pub use eval::suppression::SuppressionMap;
pub use eval::{EvalError, EvalRequest, PolicyEvaluator};
pub use fs::{Filesystem, OsFilesystem};
pub use input::{
    DetectError, DetectOptions, DetectWarning, Detectable, InputState, InputType, Loader,
    LoadedConfiguration,
};
pub use results::{InputResults, Results, RuleResult, RuleResults};
pub use scanner::{ScanReport, Scanner};
