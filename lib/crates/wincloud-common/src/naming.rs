//! Deterministic naming for the remote resources owned by one instance.
//!
//! Every remote name is derived from the user-chosen logical name, so a
//! retried `create` targets the same resource group and key pair instead of
//! allocating duplicates.

use thiserror::Error;

/// Value of the `ManagedBy` tag applied to every remote resource.
pub const MANAGED_BY: &str = "wincloud";

/// Tag key marking resources this tool created.
pub const TAG_MANAGED_BY: &str = "ManagedBy";

/// Tag key holding the name a resource was created under.
pub const TAG_NAME: &str = "Name";

/// Version of the embedded infrastructure template, recorded as a tag.
pub const TEMPLATE_VERSION: &str = "2024-06-01";

/// Prefix shared by resource-group and key-pair names.
const NAME_PREFIX: &str = "wincloud-";

/// Longest accepted logical name. Keeps derived names well under the
/// provider's 128-character stack-name and 255-character key-name limits.
pub const MAX_NAME_LEN: usize = 40;

/// Rejection reason for a logical instance name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid instance name '{name}': {reason}")]
pub struct InvalidName {
    pub name: String,
    pub reason: &'static str,
}

/// Validate a logical instance name: 1–40 chars of `[a-z0-9-]`, starting and
/// ending with an alphanumeric character.
pub fn validate_instance_name(name: &str) -> Result<(), InvalidName> {
    let reject = |reason| {
        Err(InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject("name cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("name must be at most 40 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return reject("name may only contain lowercase letters, digits and '-'");
    }
    if name.starts_with('-') || name.ends_with('-') {
        return reject("name must start and end with a letter or digit");
    }
    Ok(())
}

/// Resource-group (stack) name for a logical instance name.
pub fn resource_group_name(name: &str) -> String {
    format!("{NAME_PREFIX}{name}")
}

/// Key-pair name for a logical instance name.
pub fn key_pair_name(name: &str) -> String {
    format!("{NAME_PREFIX}{name}")
}
