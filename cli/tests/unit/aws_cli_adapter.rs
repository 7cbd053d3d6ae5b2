//! `AwsCliControlPlane` against a scripted `aws` executable.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use wincloud_cli::application::ports::{
    Instances, KeyPairs, LaunchSpec, PasswordData, ResourceGroups,
};
use wincloud_cli::domain::ControlPlaneError;
use wincloud_cli::infra::aws_cli::AwsCliControlPlane;
use wincloud_common::{InstanceState, ResourceGroupStatus};

use crate::helpers::{ScriptedRunner, aws_error, ok_output};

const REGION: &str = "eu-west-1";

fn plane(
    replies: impl IntoIterator<Item = std::process::Output>,
) -> AwsCliControlPlane<ScriptedRunner> {
    AwsCliControlPlane::new(ScriptedRunner::new(replies))
}

fn runner(cp: &AwsCliControlPlane<ScriptedRunner>) -> &ScriptedRunner {
    cp.runner()
}

#[tokio::test]
async fn every_call_pins_region_and_json_output() {
    let cp = plane([ok_output(b"")]);
    cp.delete_key_pair(REGION, "wincloud-test01").await.expect("delete");
    let args = runner(&cp).args(0);
    assert_eq!(&args[..2], ["ec2", "delete-key-pair"]);
    assert_eq!(runner(&cp).flag_value(0, "--region").as_deref(), Some(REGION));
    assert_eq!(runner(&cp).flag_value(0, "--output").as_deref(), Some("json"));
    assert_eq!(runner(&cp).calls.borrow()[0].0, "aws");
}

#[tokio::test]
async fn create_stack_passes_parameters_and_tags_as_json() {
    let cp = plane([ok_output(
        br#"{"StackId": "arn:aws:cloudformation:eu-west-1:123:stack/wincloud-test01/abc"}"#,
    )]);
    let id = cp
        .create_resource_group(
            REGION,
            "wincloud-test01",
            "Resources: {}",
            &[("RDPSourceCIDR", "203.0.113.0/24")],
        )
        .await
        .expect("create");
    assert!(id.ends_with("/abc"));

    let params: serde_json::Value =
        serde_json::from_str(&runner(&cp).flag_value(0, "--parameters").unwrap()).unwrap();
    assert_eq!(params[0]["ParameterKey"], "RDPSourceCIDR");
    assert_eq!(params[0]["ParameterValue"], "203.0.113.0/24");

    let tags: serde_json::Value =
        serde_json::from_str(&runner(&cp).flag_value(0, "--tags").unwrap()).unwrap();
    let managed = tags
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["Key"] == "ManagedBy")
        .expect("ManagedBy tag");
    assert_eq!(managed["Value"], "wincloud");
    assert_eq!(
        runner(&cp).flag_value(0, "--client-request-token").as_deref(),
        Some("create-wincloud-test01")
    );
}

#[tokio::test]
async fn describe_stack_reads_tags() {
    let cp = plane([ok_output(
        br#"{"Stacks": [{
            "StackId": "arn:stack/wincloud-test01/abc",
            "StackStatus": "CREATE_IN_PROGRESS",
            "Tags": [
                {"Key": "ManagedBy", "Value": "wincloud"},
                {"Key": "Name", "Value": "wincloud-test01"}
            ]
        }]}"#,
    )]);
    let desc = cp
        .describe_resource_group(REGION, "wincloud-test01")
        .await
        .expect("describe");
    assert!(desc.is_managed_as("wincloud-test01"));
    assert!(!desc.is_managed_as("wincloud-other"));
}

#[tokio::test]
async fn describe_stack_reads_status_reason_and_outputs() {
    let cp = plane([ok_output(
        br#"{"Stacks": [{
            "StackId": "arn:stack/wincloud-test01/abc",
            "StackStatus": "CREATE_COMPLETE",
            "Outputs": [
                {"OutputKey": "SubnetId", "OutputValue": "subnet-1"},
                {"OutputKey": "SecurityGroupId", "OutputValue": "sg-1"}
            ]
        }]}"#,
    )]);
    let desc = cp
        .describe_resource_group(REGION, "wincloud-test01")
        .await
        .expect("describe");
    assert_eq!(desc.status, ResourceGroupStatus::Created);
    assert_eq!(desc.outputs.get("SubnetId").map(String::as_str), Some("subnet-1"));
    assert_eq!(desc.outputs.get("SecurityGroupId").map(String::as_str), Some("sg-1"));
}

#[tokio::test]
async fn missing_stack_is_not_found() {
    let cp = plane([aws_error(
        "ValidationError",
        "DescribeStacks",
        "Stack with id wincloud-test01 does not exist",
    )]);
    let err = cp
        .describe_resource_group(REGION, "wincloud-test01")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn run_instances_sends_volume_and_idempotency_token() {
    let cp = plane([ok_output(br#"{"Instances": [{"InstanceId": "i-0abc"}]}"#)]);
    let spec = LaunchSpec {
        region: REGION,
        name: "test01",
        image_id: "ami-0123456789abcdef0",
        instance_type: "t3.medium",
        key_name: "wincloud-test01",
        subnet_id: "subnet-1",
        security_group_id: "sg-1",
        volume_size_gb: 80,
    };
    let id = cp.create_instance(&spec).await.expect("launch");
    assert_eq!(id, "i-0abc");

    let devices: serde_json::Value =
        serde_json::from_str(&runner(&cp).flag_value(0, "--block-device-mappings").unwrap())
            .unwrap();
    assert_eq!(devices[0]["Ebs"]["VolumeSize"], 80);
    assert_eq!(
        runner(&cp).flag_value(0, "--client-token").as_deref(),
        Some("test01-subnet-1")
    );
}

#[tokio::test]
async fn capacity_error_is_classified() {
    let cp = plane([aws_error(
        "InsufficientInstanceCapacity",
        "RunInstances",
        "We currently do not have sufficient t3.medium capacity",
    )]);
    let spec = LaunchSpec {
        region: REGION,
        name: "test01",
        image_id: "ami-0123456789abcdef0",
        instance_type: "t3.medium",
        key_name: "wincloud-test01",
        subnet_id: "subnet-1",
        security_group_id: "sg-1",
        volume_size_gb: 50,
    };
    let err = cp.create_instance(&spec).await.unwrap_err();
    assert!(matches!(err, ControlPlaneError::Capacity(_)), "got {err:?}");
}

#[tokio::test]
async fn describe_instance_maps_state_and_addresses() {
    let cp = plane([ok_output(
        br#"{"Reservations": [{"Instances": [{
            "InstanceId": "i-0abc",
            "State": {"Name": "running"},
            "InstanceType": "t3.medium",
            "PublicIpAddress": "203.0.113.7",
            "PrivateIpAddress": "10.0.1.5",
            "Placement": {"AvailabilityZone": "eu-west-1a"},
            "LaunchTime": "2026-10-16T09:00:00+00:00"
        }]}]}"#,
    )]);
    let details = cp.describe_instance(REGION, "i-0abc").await.expect("describe");
    assert_eq!(details.state, Some(InstanceState::Running));
    assert_eq!(details.public_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(details.availability_zone.as_deref(), Some("eu-west-1a"));
}

#[tokio::test]
async fn find_instances_filters_by_tags_and_live_states() {
    let cp = plane([ok_output(
        br#"{"Reservations": [
            {"Instances": [{"InstanceId": "i-0aaa"}]},
            {"Instances": [{"InstanceId": "i-0bbb"}]}
        ]}"#,
    )]);
    let ids = cp.find_instances(REGION, "test01").await.expect("find");
    assert_eq!(ids, ["i-0aaa", "i-0bbb"]);

    let args = runner(&cp).args(0);
    assert_eq!(&args[..2], ["ec2", "describe-instances"]);
    assert!(args.contains(&"Name=tag:ManagedBy,Values=wincloud".to_string()));
    assert!(args.contains(&"Name=tag:Name,Values=test01".to_string()));
    let states = args
        .iter()
        .find(|a| a.starts_with("Name=instance-state-name"))
        .expect("state filter");
    assert!(!states.contains("terminated"), "{states}");
}

#[tokio::test]
async fn find_instances_with_no_match_is_empty() {
    let cp = plane([ok_output(br#"{"Reservations": []}"#)]);
    assert!(cp.find_instances(REGION, "test01").await.expect("find").is_empty());
}

#[tokio::test]
async fn empty_password_data_means_not_yet_available() {
    let cp = plane([
        ok_output(br#"{"InstanceId": "i-0abc", "PasswordData": ""}"#),
        ok_output(br#"{"InstanceId": "i-0abc", "PasswordData": "\r\nQUJD\r\n"}"#),
    ]);
    assert_eq!(cp.get_password_material(REGION, "i-0abc").await.unwrap(), None);
    assert_eq!(
        cp.get_password_material(REGION, "i-0abc").await.unwrap().as_deref(),
        Some("QUJD")
    );
}

#[tokio::test]
async fn import_key_pair_base64_encodes_the_public_key() {
    use base64::Engine as _;

    let cp = plane([ok_output(br#"{"KeyName": "wincloud-test01"}"#)]);
    cp.import_key_pair(REGION, "wincloud-test01", "ssh-rsa AAAA wincloud-test01")
        .await
        .expect("import");
    let material = runner(&cp).flag_value(0, "--public-key-material").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(material)
        .unwrap();
    assert_eq!(decoded, b"ssh-rsa AAAA wincloud-test01");
}

#[tokio::test]
async fn duplicate_key_pair_is_already_exists() {
    let cp = plane([aws_error(
        "InvalidKeyPair.Duplicate",
        "ImportKeyPair",
        "The keypair already exists",
    )]);
    let err = cp
        .import_key_pair(REGION, "wincloud-test01", "ssh-rsa AAAA")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::AlreadyExists(_)), "got {err:?}");
}

#[tokio::test]
async fn describe_key_pair_returns_registered_public_key() {
    let cp = plane([ok_output(
        br#"{"KeyPairs": [{"KeyName": "wincloud-test01", "PublicKey": "ssh-rsa AAAA wincloud-test01\n"}]}"#,
    )]);
    let key = cp
        .describe_key_pair(REGION, "wincloud-test01")
        .await
        .expect("describe");
    assert_eq!(key.as_deref(), Some("ssh-rsa AAAA wincloud-test01"));
    assert!(runner(&cp).args(0).contains(&"--include-public-key".to_string()));
}

#[tokio::test]
async fn missing_key_pair_describes_as_none() {
    let cp = plane([aws_error(
        "InvalidKeyPair.NotFound",
        "DescribeKeyPairs",
        "The key pair 'wincloud-test01' does not exist",
    )]);
    let key = cp
        .describe_key_pair(REGION, "wincloud-test01")
        .await
        .expect("describe");
    assert_eq!(key, None);
}

#[tokio::test]
async fn runner_timeout_is_transient() {
    let cp = AwsCliControlPlane::new(ScriptedRunner::failing(
        "aws ec2 describe-instances timed out after 60s",
    ));
    let err = cp.describe_instance(REGION, "i-0abc").await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}

#[tokio::test]
async fn missing_executable_is_not_retried() {
    let cp = AwsCliControlPlane::new(ScriptedRunner::failing("No such file or directory"));
    let err = cp.stop_instance(REGION, "i-0abc").await.unwrap_err();
    assert!(matches!(err, ControlPlaneError::Other(_)), "got {err:?}");
}
