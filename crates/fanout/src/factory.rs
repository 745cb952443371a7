//! Session factory for real SSH connections

use fanout_core::{RunConfig, SessionFactory};
use fanout_exec::{ConnectionInfo, RemoteSession, SshSession};

/// Builds password-authenticated `SshSession`s from the run configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct SshSessionFactory;

impl SshSessionFactory {
    fn connection_info(host: &str, config: &RunConfig) -> ConnectionInfo {
        ConnectionInfo::new(host, &config.username).with_port(config.port)
    }
}

impl SessionFactory for SshSessionFactory {
    fn create(&self, host: &str, config: &RunConfig) -> Box<dyn RemoteSession> {
        let session =
            SshSession::new(Self::connection_info(host, config)).with_timeout(config.timeout());
        Box::new(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_uses_config() {
        let mut config = RunConfig::new("deploy").with_hosts(["web-1"]);
        config.port = 2222;

        let info = SshSessionFactory::connection_info("web-1", &config);
        assert_eq!(info.display_target(), "deploy@web-1:2222");
    }

    #[test]
    fn test_created_session_starts_disconnected() {
        let config = RunConfig::new("deploy").with_hosts(["10.0.0.7"]);
        let session = SshSessionFactory.create("10.0.0.7", &config);

        assert_eq!(session.host(), "10.0.0.7");
        assert!(!session.is_connected());
    }
}
