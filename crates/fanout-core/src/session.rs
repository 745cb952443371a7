//! Session construction seam

use fanout_exec::RemoteSession;

use crate::config::RunConfig;

/// Builds one unconnected session per host
///
/// The engine owns each session for the duration of a single host unit and
/// always disconnects it before the unit returns.
pub trait SessionFactory: Send + Sync {
    fn create(&self, host: &str, config: &RunConfig) -> Box<dyn RemoteSession>;
}
