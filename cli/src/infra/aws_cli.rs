//! Infrastructure implementation of the control-plane port traits.
//!
//! `AwsCliControlPlane<R>` routes every call through the `aws` CLI via a
//! `CommandRunner`, always with `--region R --output json`. Resource groups
//! are CloudFormation stacks; instances, key pairs and password data are
//! EC2. Failures are classified from the CLI's stderr.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use wincloud_common::{
    InstanceDetails, InstanceState, MANAGED_BY, ResourceGroupStatus, TAG_MANAGED_BY, TAG_NAME,
    TEMPLATE_VERSION,
};

use crate::application::ports::{
    CommandRunner, CpResult, Instances, KeyPairs, LaunchSpec, PasswordData,
    ResourceGroupDescription, ResourceGroups,
};
use crate::domain::ControlPlaneError;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

const AWS_PROGRAM: &str = "aws";

/// Root device of Amazon's Windows images.
const WINDOWS_ROOT_DEVICE: &str = "/dev/sda1";

/// Upper bound the provider puts on idempotency tokens.
const MAX_CLIENT_TOKEN_LEN: usize = 64;
const MAX_STACK_TOKEN_LEN: usize = 128;

/// Everything short of `terminated`.
const LIVE_INSTANCE_STATES: &str =
    "Name=instance-state-name,Values=pending,running,stopping,stopped,shutting-down";

/// Control plane backed by the `aws` CLI.
///
/// Generic over `R: CommandRunner` so tests can inject a scripted runner
/// without spawning real processes.
pub struct AwsCliControlPlane<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> AwsCliControlPlane<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// The underlying runner.
    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn call(&self, region: &str, args: &[&str]) -> CpResult<Value> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend_from_slice(&["--region", region, "--output", "json"]);
        let command = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        tracing::debug!(%command, region, "aws call");

        let output = self.runner.run(AWS_PROGRAM, &full).await.map_err(|e| {
            let message = format!("{e:#}");
            if message.contains("timed out") {
                ControlPlaneError::Transient(message)
            } else {
                ControlPlaneError::Other(format!("cannot run {AWS_PROGRAM}: {message}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = classify(&stderr);
            tracing::debug!(error = %err, "aws call failed");
            return Err(err);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|e| ControlPlaneError::Other(format!("unparseable aws output: {e}")))
    }
}

impl AwsCliControlPlane<TokioCommandRunner> {
    /// Convenience constructor for production use. Disables the CLI pager,
    /// which would otherwise block on a TTY.
    #[must_use]
    pub fn default_runner() -> Self {
        Self::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT).with_env("AWS_PAGER", ""))
    }
}

// ── Resource groups (CloudFormation) ──────────────────────────────────────────

impl<R: CommandRunner> ResourceGroups for AwsCliControlPlane<R> {
    async fn create_resource_group(
        &self,
        region: &str,
        name: &str,
        template_body: &str,
        parameters: &[(&str, &str)],
    ) -> CpResult<String> {
        let parameters = Value::Array(
            parameters
                .iter()
                .map(|(k, v)| json!({"ParameterKey": k, "ParameterValue": v}))
                .collect(),
        )
        .to_string();
        let tags = tags_value(name).to_string();
        let token = stack_request_token(name);
        let out = self
            .call(
                region,
                &[
                    "cloudformation",
                    "create-stack",
                    "--stack-name",
                    name,
                    "--template-body",
                    template_body,
                    "--parameters",
                    &parameters,
                    "--tags",
                    &tags,
                    "--client-request-token",
                    &token,
                ],
            )
            .await?;
        out.get("StackId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ControlPlaneError::Other("create-stack returned no StackId".into()))
    }

    async fn describe_resource_group(
        &self,
        region: &str,
        name_or_id: &str,
    ) -> CpResult<ResourceGroupDescription> {
        let out = self
            .call(
                region,
                &["cloudformation", "describe-stacks", "--stack-name", name_or_id],
            )
            .await?;
        parse_stack(&out, name_or_id)
    }

    async fn delete_resource_group(&self, region: &str, name_or_id: &str) -> CpResult<()> {
        self.call(
            region,
            &["cloudformation", "delete-stack", "--stack-name", name_or_id],
        )
        .await
        .map(drop)
    }
}

// ── Instances (EC2) ───────────────────────────────────────────────────────────

impl<R: CommandRunner> Instances for AwsCliControlPlane<R> {
    async fn create_instance(&self, spec: &LaunchSpec<'_>) -> CpResult<String> {
        let block_devices = json!([{
            "DeviceName": WINDOWS_ROOT_DEVICE,
            "Ebs": {
                "VolumeSize": spec.volume_size_gb,
                "VolumeType": "gp3",
                "DeleteOnTermination": true,
            },
        }])
        .to_string();
        let tag_specs = json!([{
            "ResourceType": "instance",
            "Tags": tags_value(spec.name),
        }])
        .to_string();
        let token = client_token(spec);
        let out = self
            .call(
                spec.region,
                &[
                    "ec2",
                    "run-instances",
                    "--image-id",
                    spec.image_id,
                    "--instance-type",
                    spec.instance_type,
                    "--key-name",
                    spec.key_name,
                    "--subnet-id",
                    spec.subnet_id,
                    "--security-group-ids",
                    spec.security_group_id,
                    "--count",
                    "1",
                    "--client-token",
                    &token,
                    "--block-device-mappings",
                    &block_devices,
                    "--tag-specifications",
                    &tag_specs,
                    "--metadata-options",
                    "HttpTokens=required",
                ],
            )
            .await?;
        out.pointer("/Instances/0/InstanceId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ControlPlaneError::Other("run-instances returned no InstanceId".into()))
    }

    async fn describe_instance(&self, region: &str, instance_id: &str) -> CpResult<InstanceDetails> {
        let out = self
            .call(
                region,
                &["ec2", "describe-instances", "--instance-ids", instance_id],
            )
            .await?;
        parse_instance(&out, instance_id)
    }

    async fn start_instance(&self, region: &str, instance_id: &str) -> CpResult<()> {
        self.call(region, &["ec2", "start-instances", "--instance-ids", instance_id])
            .await
            .map(drop)
    }

    async fn stop_instance(&self, region: &str, instance_id: &str) -> CpResult<()> {
        self.call(region, &["ec2", "stop-instances", "--instance-ids", instance_id])
            .await
            .map(drop)
    }

    async fn terminate_instance(&self, region: &str, instance_id: &str) -> CpResult<()> {
        self.call(
            region,
            &["ec2", "terminate-instances", "--instance-ids", instance_id],
        )
        .await
        .map(drop)
    }

    async fn find_instances(&self, region: &str, name: &str) -> CpResult<Vec<String>> {
        let managed = format!("Name=tag:{TAG_MANAGED_BY},Values={MANAGED_BY}");
        let named = format!("Name=tag:{TAG_NAME},Values={name}");
        let out = self
            .call(
                region,
                &[
                    "ec2",
                    "describe-instances",
                    "--filters",
                    &managed,
                    &named,
                    LIVE_INSTANCE_STATES,
                ],
            )
            .await?;
        Ok(instance_ids(&out))
    }
}

impl<R: CommandRunner> PasswordData for AwsCliControlPlane<R> {
    async fn get_password_material(
        &self,
        region: &str,
        instance_id: &str,
    ) -> CpResult<Option<String>> {
        let out = self
            .call(
                region,
                &["ec2", "get-password-data", "--instance-id", instance_id],
            )
            .await?;
        Ok(out
            .get("PasswordData")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }
}

impl<R: CommandRunner> KeyPairs for AwsCliControlPlane<R> {
    async fn import_key_pair(&self, region: &str, name: &str, public_key: &str) -> CpResult<()> {
        // CLI v2 takes blob arguments base64-encoded.
        let material = STANDARD.encode(public_key.as_bytes());
        let tag_specs = json!([{
            "ResourceType": "key-pair",
            "Tags": tags_value(name),
        }])
        .to_string();
        self.call(
            region,
            &[
                "ec2",
                "import-key-pair",
                "--key-name",
                name,
                "--public-key-material",
                &material,
                "--tag-specifications",
                &tag_specs,
            ],
        )
        .await
        .map(drop)
    }

    async fn describe_key_pair(&self, region: &str, name: &str) -> CpResult<Option<String>> {
        let described = self
            .call(
                region,
                &[
                    "ec2",
                    "describe-key-pairs",
                    "--key-names",
                    name,
                    "--include-public-key",
                ],
            )
            .await;
        match described {
            Ok(out) => Ok(out
                .pointer("/KeyPairs/0/PublicKey")
                .and_then(Value::as_str)
                .map(|key| key.trim().to_string())),
            Err(ControlPlaneError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_key_pair(&self, region: &str, name: &str) -> CpResult<()> {
        self.call(region, &["ec2", "delete-key-pair", "--key-name", name])
            .await
            .map(drop)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

fn tags_value(name: &str) -> Value {
    json!([
        {"Key": TAG_MANAGED_BY, "Value": MANAGED_BY},
        {"Key": TAG_NAME, "Value": name},
        {"Key": "TemplateVersion", "Value": TEMPLATE_VERSION},
    ])
}

/// Stable per logical name and subnet, so a retried launch inside one
/// resource group returns the original instance instead of a second one.
fn client_token(spec: &LaunchSpec<'_>) -> String {
    let mut token = format!("{}-{}", spec.name, spec.subnet_id);
    token.truncate(MAX_CLIENT_TOKEN_LEN);
    token
}

/// Stable per stack name, so a create-stack retried after a lost response
/// is recognised as the same request instead of failing as a duplicate.
fn stack_request_token(name: &str) -> String {
    let mut token = format!("create-{name}");
    token.truncate(MAX_STACK_TOKEN_LEN);
    token
}

/// Every instance id in `describe-instances` output.
fn instance_ids(out: &Value) -> Vec<String> {
    out.get("Reservations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("Instances").and_then(Value::as_array))
        .flatten()
        .filter_map(|i| i.get("InstanceId").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Map a CloudFormation stack status onto the resource-group lifecycle.
#[must_use]
pub fn stack_status(status: &str) -> ResourceGroupStatus {
    match status {
        "CREATE_COMPLETE" => ResourceGroupStatus::Created,
        "DELETE_IN_PROGRESS" => ResourceGroupStatus::Deleting,
        "DELETE_COMPLETE" => ResourceGroupStatus::Deleted,
        "DELETE_FAILED" => ResourceGroupStatus::DeleteFailed,
        // Rollback has to finish before the stack can be deleted.
        s if s.ends_with("_IN_PROGRESS") => ResourceGroupStatus::InProgress,
        s if s.starts_with("UPDATE_") && s.ends_with("_COMPLETE") && !s.contains("ROLLBACK") => {
            ResourceGroupStatus::Created
        }
        _ => ResourceGroupStatus::Failed,
    }
}

/// Parse `describe-stacks` output.
///
/// # Errors
///
/// `NotFound` if no stack is listed.
pub fn parse_stack(out: &Value, name_or_id: &str) -> CpResult<ResourceGroupDescription> {
    let stack = out
        .pointer("/Stacks/0")
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Stack {name_or_id} does not exist")))?;
    let status = stack
        .get("StackStatus")
        .and_then(Value::as_str)
        .map_or(ResourceGroupStatus::Failed, stack_status);
    let outputs = stack
        .get("Outputs")
        .and_then(Value::as_array)
        .map(|outputs| {
            outputs
                .iter()
                .filter_map(|o| {
                    Some((
                        o.get("OutputKey")?.as_str()?.to_string(),
                        o.get("OutputValue")?.as_str()?.to_string(),
                    ))
                })
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    let tags = stack
        .get("Tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| {
                    Some((
                        t.get("Key")?.as_str()?.to_string(),
                        t.get("Value")?.as_str()?.to_string(),
                    ))
                })
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    Ok(ResourceGroupDescription {
        id: stack.get("StackId").and_then(Value::as_str).map(str::to_string),
        status,
        reason: stack
            .get("StackStatusReason")
            .and_then(Value::as_str)
            .map(str::to_string),
        outputs,
        tags,
    })
}

/// Parse `describe-instances` output for one instance.
///
/// # Errors
///
/// `NotFound` if the reservation list is empty.
pub fn parse_instance(out: &Value, instance_id: &str) -> CpResult<InstanceDetails> {
    let instance = out
        .get("Reservations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("Instances").and_then(Value::as_array))
        .flatten()
        .next()
        .ok_or_else(|| {
            ControlPlaneError::NotFound(format!("The instance ID '{instance_id}' does not exist"))
        })?;
    let text = |pointer: &str| {
        instance
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Ok(InstanceDetails {
        instance_id: text("/InstanceId").unwrap_or_else(|| instance_id.to_string()),
        state: instance
            .pointer("/State/Name")
            .and_then(Value::as_str)
            .and_then(InstanceState::from_provider),
        instance_type: text("/InstanceType"),
        public_ip: text("/PublicIpAddress"),
        private_ip: text("/PrivateIpAddress"),
        availability_zone: text("/Placement/AvailabilityZone"),
        subnet_id: text("/SubnetId"),
        key_name: text("/KeyName"),
        launch_time: text("/LaunchTime"),
    })
}

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "RequestTimeout",
    "ServiceUnavailable",
    "InternalError",
    "InternalFailure",
];

const TRANSIENT_TEXT: &[&str] = &[
    "Could not connect to the endpoint URL",
    "Connection was closed",
    "Read timeout",
    "Connect timeout",
];

/// Provider error code from CLI stderr, e.g. `InvalidInstanceID.NotFound`
/// out of `An error occurred (InvalidInstanceID.NotFound) when calling ...`.
fn error_code(stderr: &str) -> Option<&str> {
    let start = stderr.find("An error occurred (")? + "An error occurred (".len();
    let len = stderr[start..].find(')')?;
    Some(&stderr[start..start + len])
}

/// Classify a failed CLI call from its stderr.
#[must_use]
pub fn classify(stderr: &str) -> ControlPlaneError {
    let message = stderr.trim().to_string();
    let code = error_code(stderr).unwrap_or_default();

    if TRANSIENT_CODES.contains(&code) || TRANSIENT_TEXT.iter().any(|t| message.contains(t)) {
        return ControlPlaneError::Transient(message);
    }
    if matches!(
        code,
        "InsufficientInstanceCapacity" | "InstanceLimitExceeded" | "VcpuLimitExceeded"
    ) {
        return ControlPlaneError::Capacity(message);
    }
    if code.starts_with("InvalidAMIID") {
        return ControlPlaneError::InvalidSpec(message);
    }
    if code.ends_with(".NotFound") || message.contains("does not exist") {
        return ControlPlaneError::NotFound(message);
    }
    if code == "AlreadyExistsException" || code == "InvalidKeyPair.Duplicate" {
        return ControlPlaneError::AlreadyExists(message);
    }
    if code == "UnauthorizedOperation"
        || code.starts_with("AccessDenied")
        || code == "AuthFailure"
        || code == "ExpiredToken"
        || message.contains("Unable to locate credentials")
    {
        return ControlPlaneError::PermissionDenied(message);
    }
    if code.starts_with("Invalid") || code == "ValidationError" || code == "MissingParameter" {
        return ControlPlaneError::InvalidSpec(message);
    }
    ControlPlaneError::Other(message)
}
