//! fanout-exec: Remote execution abstraction
//!
//! Provides the per-host session trait, its SSH implementation and a local
//! executor used for staging work on the controlling machine.

pub mod error;
pub mod local;
pub mod result;
pub mod secret;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::{CommandOutcome, ConnectionInfo};
pub use secret::Secret;
pub use ssh::SshSession;
pub use traits::RemoteSession;
