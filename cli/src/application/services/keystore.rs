//! Local private keys and their remote key-pair registrations.
//!
//! A key file exists locally exactly when the matching key pair is
//! registered remotely: `generate` registers first and unregisters again if
//! the local write fails; `delete` removes the remote half first.

use std::cell::Cell;

use crate::application::ports::{Clock, ControlPlane, KeyMaterialStore};
use crate::application::services::Remote;
use crate::domain::{ControlPlaneError, KeyMaterial, ProvisionError};

/// Create, register and persist a fresh key for key pair `key_name`.
///
/// # Errors
///
/// `KeyConflict` if a local key file or remote registration already exists;
/// `LocalState` if the key cannot be written; control-plane errors otherwise.
pub async fn generate(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    keys: &impl KeyMaterialStore,
    region: &str,
    key_name: &str,
    bits: usize,
) -> Result<KeyMaterial, ProvisionError> {
    // A local file without a remote registration is still a conflict: the
    // user decides whether the old key is disposable.
    if keys
        .exists(key_name)
        .await
        .map_err(|e| ProvisionError::local(&e))?
    {
        return Err(ProvisionError::KeyConflict {
            name: key_name.to_string(),
        });
    }

    let material = KeyMaterial::generate(key_name, bits)?;
    let public_key = material.public_key_openssh()?;

    let interrupted = Cell::new(false);
    let imported = remote
        .call("import-key-pair", || async {
            let result = remote.cp.import_key_pair(region, key_name, &public_key).await;
            if result.as_ref().is_err_and(ControlPlaneError::is_transient) {
                interrupted.set(true);
            }
            result
        })
        .await;
    match imported {
        Ok(()) => {}
        // A duplicate after a lost response is our own registration only if
        // it holds exactly this public key.
        Err(ControlPlaneError::AlreadyExists(_)) if interrupted.get() => {
            let registered = remote
                .call("describe-key-pairs", || {
                    remote.cp.describe_key_pair(region, key_name)
                })
                .await?;
            if !registered.is_some_and(|key| same_public_key(&key, &public_key)) {
                return Err(ProvisionError::KeyConflict {
                    name: key_name.to_string(),
                });
            }
        }
        Err(ControlPlaneError::AlreadyExists(_)) => {
            return Err(ProvisionError::KeyConflict {
                name: key_name.to_string(),
            });
        }
        Err(other) => return Err(ProvisionError::ControlPlane(other)),
    }
    tracing::info!(key_name, region, "key pair registered");

    if let Err(err) = keys.write(&material).await {
        tracing::warn!(key_name, error = %err, "key write failed, unregistering key pair");
        if let Err(cleanup) = remote
            .call("delete-key-pair", || remote.cp.delete_key_pair(region, key_name))
            .await
        {
            tracing::warn!(key_name, error = %cleanup, "could not unregister key pair");
        }
        return Err(ProvisionError::local(&err));
    }
    Ok(material)
}

/// Compare OpenSSH public keys by type and key blob, ignoring comments.
fn same_public_key(a: &str, b: &str) -> bool {
    fn fields(key: &str) -> (Option<&str>, Option<&str>) {
        let mut parts = key.split_whitespace();
        (parts.next(), parts.next())
    }
    let (a, b) = (fields(a), fields(b));
    a.1.is_some() && a == b
}

/// Load the local key for key pair `key_name`.
///
/// # Errors
///
/// `KeyNotFound` if no key file exists; `LocalState` if it cannot be read.
pub async fn load(
    keys: &impl KeyMaterialStore,
    key_name: &str,
) -> Result<KeyMaterial, ProvisionError> {
    keys.read(key_name)
        .await
        .map_err(|e| ProvisionError::local(&e))?
        .ok_or_else(|| ProvisionError::KeyNotFound {
            name: key_name.to_string(),
        })
}

/// Remove the remote registration, then the local file. Absence of either
/// is not an error. Returns whether a local key file was removed.
///
/// # Errors
///
/// Returns control-plane or local I/O failures.
pub async fn delete(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    keys: &impl KeyMaterialStore,
    region: &str,
    key_name: &str,
) -> Result<bool, ProvisionError> {
    match remote
        .call("delete-key-pair", || remote.cp.delete_key_pair(region, key_name))
        .await
    {
        Ok(()) | Err(ControlPlaneError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    let removed = keys
        .remove(key_name)
        .await
        .map_err(|e| ProvisionError::local(&e))?;
    tracing::info!(key_name, local_file_removed = removed, "key pair deleted");
    Ok(removed)
}
