//! The network template submitted for every instance, embedded at build time.

/// CloudFormation template: VPC, internet gateway, public subnet, route
/// table and an RDP-only security group. Outputs `VpcId`, `SubnetId` and
/// `SecurityGroupId`; takes the `RDPSourceCIDR` parameter.
pub const WINDOWS_INSTANCE_TEMPLATE: &str = include_str!("../../templates/windows-instance.yaml");
