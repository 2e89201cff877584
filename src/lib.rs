/// Reqop - a declarative HTTP request executor for infrastructure-as-code
/// plugins: retry with backoff, conditional polling, response expectations,
/// value extraction and destroy-time cleanup with template interpolation
pub mod client;
pub mod conditions;
pub mod destroy;
pub mod error;
pub mod executor;
pub mod expectations;
pub mod extraction;
pub mod interpolation;
pub mod json_path;
pub mod models;
pub mod redact;
pub mod request;
pub mod retry;
pub mod state;

pub use destroy::destroy;
pub use error::{Error, Result};
pub use executor::{execute, ExecuteOutcome};
pub use models::{
    AuthSpec, Backoff, BasicAuth, BodySource, Diagnostics, Expectations, ExtractRule,
    ExtractSource, HeaderEntry, PollCondition, ProviderDefaults, RequestSpec, ResponseResult,
    RetrySpec,
};
pub use redact::Secret;
pub use state::{resource_id, ResourceState, Role};
