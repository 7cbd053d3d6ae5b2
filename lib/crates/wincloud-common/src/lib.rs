pub mod naming;
pub mod types;

pub use naming::{
    InvalidName, MANAGED_BY, TAG_MANAGED_BY, TAG_NAME, TEMPLATE_VERSION, key_pair_name,
    resource_group_name, validate_instance_name,
};
pub use types::*;
