//! Auto-scaling group lookup through the AWS CLI

use std::time::Duration;

use async_trait::async_trait;
use fanout_exec::{ExecError, LocalExecutor};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::FleetError;
use crate::resolver::{FleetMember, HostSetResolver};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeGroupsReply {
    #[serde(default)]
    auto_scaling_groups: Vec<AutoScalingGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AutoScalingGroup {
    #[serde(default)]
    instances: Vec<GroupInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupInstance {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesReply {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    private_ip_address: Option<String>,
    private_dns_name: Option<String>,
    state: InstanceState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceState {
    name: String,
}

impl Ec2Instance {
    /// Private DNS name, falling back to the private IP
    fn address(&self) -> String {
        self.private_dns_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.private_ip_address.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

/// Resolves auto-scaling groups by shelling out to `aws`
///
/// Credentials and default region come from the usual AWS CLI environment
/// (instance role, profile, `AWS_REGION`).
#[derive(Debug, Clone)]
pub struct AwsCliResolver {
    executor: LocalExecutor,
    /// Path or name of the `aws` binary
    program: String,
    /// Limit for each API call
    timeout: Duration,
}

impl AwsCliResolver {
    /// Create a resolver using `aws` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            executor: LocalExecutor::new(),
            program: "aws".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Use a specific `aws` binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one `aws ... --output json` call and return its stdout
    async fn call(&self, mut args: Vec<String>, region: Option<&str>) -> Result<String, FleetError> {
        args.extend(["--output".to_string(), "json".to_string()]);
        if let Some(region) = region {
            args.extend(["--region".to_string(), region.to_string()]);
        }

        debug!(program = %self.program, args = ?args, "calling AWS CLI");

        let outcome = self
            .executor
            .run_program_with_timeout(&self.program, &args, self.timeout)
            .await
            .map_err(|e| match e {
                ExecError::SpawnError(msg) => FleetError::ToolNotFound(msg),
                ExecError::Timeout { timeout } => FleetError::Timeout(timeout),
                other => FleetError::ExecutionError(other.to_string()),
            })?;

        if !outcome.success() {
            return Err(FleetError::CommandFailed {
                status: outcome.status,
                message: outcome.stderr.trim().to_string(),
            });
        }

        Ok(outcome.stdout)
    }
}

impl Default for AwsCliResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Instance ids of the first (only) group in a describe-groups reply
fn parse_group_instance_ids(group: &str, json: &str) -> Result<Vec<String>, FleetError> {
    let reply: DescribeGroupsReply =
        serde_json::from_str(json).map_err(|e| FleetError::ParseError(e.to_string()))?;

    let asg = reply
        .auto_scaling_groups
        .into_iter()
        .next()
        .ok_or_else(|| FleetError::GroupNotFound(group.to_string()))?;

    Ok(asg.instances.into_iter().map(|i| i.instance_id).collect())
}

fn parse_members(json: &str) -> Result<Vec<FleetMember>, FleetError> {
    let reply: DescribeInstancesReply =
        serde_json::from_str(json).map_err(|e| FleetError::ParseError(e.to_string()))?;

    Ok(reply
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(|instance| {
            if instance.state.name != crate::resolver::RUNNING_STATE {
                warn!(
                    instance = %instance.instance_id,
                    state = %instance.state.name,
                    "instance is not running"
                );
            }
            FleetMember::new(instance.address(), instance.state.name)
        })
        .collect())
}

#[async_trait]
impl HostSetResolver for AwsCliResolver {
    #[instrument(skip(self))]
    async fn resolve(
        &self,
        group: &str,
        region: Option<&str>,
    ) -> Result<Vec<FleetMember>, FleetError> {
        info!(group = %group, "retrieving instances from auto-scaling group");

        let groups = self
            .call(
                vec![
                    "autoscaling".to_string(),
                    "describe-auto-scaling-groups".to_string(),
                    "--auto-scaling-group-names".to_string(),
                    group.to_string(),
                ],
                region,
            )
            .await?;
        let instance_ids = parse_group_instance_ids(group, &groups)?;

        if instance_ids.is_empty() {
            warn!(group = %group, "no instances found in auto-scaling group");
            return Ok(Vec::new());
        }

        let mut args = vec![
            "ec2".to_string(),
            "describe-instances".to_string(),
            "--instance-ids".to_string(),
        ];
        args.extend(instance_ids);

        let instances = self.call(args, region).await?;
        let members = parse_members(&instances)?;

        info!(group = %group, count = members.len(), "resolved auto-scaling group");

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS_REPLY: &str = r#"{
        "AutoScalingGroups": [{
            "AutoScalingGroupName": "web-asg",
            "Instances": [
                {"InstanceId": "i-0aaa", "LifecycleState": "InService"},
                {"InstanceId": "i-0bbb", "LifecycleState": "InService"}
            ]
        }]
    }"#;

    const INSTANCES_REPLY: &str = r#"{
        "Reservations": [
            {"Instances": [{
                "InstanceId": "i-0aaa",
                "PrivateIpAddress": "10.0.1.5",
                "PrivateDnsName": "ip-10-0-1-5.ec2.internal",
                "State": {"Code": 16, "Name": "running"}
            }]},
            {"Instances": [{
                "InstanceId": "i-0bbb",
                "PrivateIpAddress": "10.0.1.6",
                "PrivateDnsName": "",
                "State": {"Code": 80, "Name": "stopped"}
            }]}
        ]
    }"#;

    #[test]
    fn test_parse_group_instance_ids() {
        let ids = parse_group_instance_ids("web-asg", GROUPS_REPLY).unwrap();
        assert_eq!(ids, vec!["i-0aaa", "i-0bbb"]);
    }

    #[test]
    fn test_missing_group() {
        let result = parse_group_instance_ids("nope", r#"{"AutoScalingGroups": []}"#);
        assert!(matches!(result, Err(FleetError::GroupNotFound(name)) if name == "nope"));
    }

    #[test]
    fn test_parse_members_prefers_dns_name() {
        let members = parse_members(INSTANCES_REPLY).unwrap();

        assert_eq!(
            members,
            vec![
                FleetMember::new("ip-10-0-1-5.ec2.internal", "running"),
                FleetMember::new("10.0.1.6", "stopped"),
            ]
        );
    }

    #[test]
    fn test_parse_members_rejects_garbage() {
        assert!(matches!(
            parse_members("not json"),
            Err(FleetError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_cli_is_reported() {
        let resolver = AwsCliResolver::new().with_program("fanout-no-such-aws-cli");
        let result = resolver.resolve("web-asg", Some("us-west-2")).await;

        assert!(matches!(result, Err(ref e) if e.needs_installation()));
    }

    #[tokio::test]
    async fn test_failing_cli_is_reported() {
        // `false` ignores its arguments and exits 1
        let resolver = AwsCliResolver::new().with_program("false");
        let result = resolver.resolve("web-asg", None).await;

        assert!(matches!(result, Err(FleetError::CommandFailed { status: 1, .. })));
    }
}
