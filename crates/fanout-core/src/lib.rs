//! fanout-core: Multi-host execution engine
//!
//! Resolves the target hosts, acquires the shared credential once, runs one
//! operation on every host serially or through a bounded worker pool, and
//! reduces the per-host outcomes into an `ExecutionSummary`.

pub mod config;
pub mod credential;
pub mod engine;
pub mod error;
pub mod operation;
pub mod session;
pub mod shell;
pub mod staging;
pub mod summary;

pub use config::{DEFAULT_MAX_PARALLEL, ExecutionMode, RunConfig, parse_host_list};
pub use credential::{
    CredentialCache, CredentialError, CredentialSource, EnvSource, PromptSource, StaticSource,
};
pub use engine::Engine;
pub use error::CoreError;
pub use operation::{CopySpec, Operation, ScriptSpec};
pub use session::SessionFactory;
pub use summary::{ExecutionSummary, HostResult, summarize};
