//! Host-set resolver trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FleetError;

/// Runtime state of a member that may be contacted
pub const RUNNING_STATE: &str = "running";

/// One machine reported by a fleet lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetMember {
    /// Address used to open sessions (DNS name or IP)
    pub address: String,
    /// Runtime state as reported by the provider (`running`, `stopped`, ...)
    pub state: String,
}

impl FleetMember {
    pub fn new(address: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: state.into(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RUNNING_STATE
    }
}

/// Resolves a named group into its members, in provider order
#[async_trait]
pub trait HostSetResolver: Send + Sync {
    /// Look up the members of `group`
    ///
    /// # Errors
    /// Any error is fatal for the invocation that asked for the group.
    async fn resolve(
        &self,
        group: &str,
        region: Option<&str>,
    ) -> Result<Vec<FleetMember>, FleetError>;
}

/// Addresses of running members with a usable address, order preserved
#[must_use]
pub fn running_addresses(members: &[FleetMember]) -> Vec<String> {
    members
        .iter()
        .filter(|m| m.is_running() && !m.address.is_empty())
        .map(|m| m.address.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_addresses_filters_and_keeps_order() {
        let members = vec![
            FleetMember::new("ip-10-0-0-3.internal", "running"),
            FleetMember::new("ip-10-0-0-1.internal", "stopped"),
            FleetMember::new("", "running"),
            FleetMember::new("ip-10-0-0-2.internal", "running"),
            FleetMember::new("ip-10-0-0-9.internal", "pending"),
        ];

        assert_eq!(
            running_addresses(&members),
            vec!["ip-10-0-0-3.internal", "ip-10-0-0-2.internal"]
        );
    }

    #[test]
    fn test_running_addresses_empty() {
        assert!(running_addresses(&[]).is_empty());
    }
}
