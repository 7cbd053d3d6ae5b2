//! Key material and boot-time password decryption.
//!
//! The control plane encrypts the initial administrator password with the
//! public half of the registered key pair (RSA, PKCS#1 v1.5 padding) and
//! returns it base64-encoded. Everything here is pure: no file or network I/O.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use crate::domain::error::ProvisionError;

/// Private key bytes bound to the key-pair name they were registered under.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub name: String,
    pub private_key_pem: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

impl KeyMaterial {
    /// Generate a fresh RSA key of `bits` bits for key pair `name`.
    ///
    /// # Errors
    ///
    /// Returns `LocalState` if the system RNG fails or the key cannot be encoded.
    pub fn generate(name: &str, bits: usize) -> Result<Self, ProvisionError> {
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| ProvisionError::LocalState(format!("key generation failed: {e}")))?;
        let pem = key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| ProvisionError::LocalState(format!("key encoding failed: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            private_key_pem: pem.to_string(),
        })
    }

    /// Parse the stored PEM. PKCS#1 is what we write; PKCS#8 is accepted too.
    ///
    /// # Errors
    ///
    /// Returns `Decryption` if the PEM is not an RSA private key.
    pub fn private_key(&self) -> Result<RsaPrivateKey, ProvisionError> {
        RsaPrivateKey::from_pkcs1_pem(&self.private_key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&self.private_key_pem))
            .map_err(|_| {
                ProvisionError::Decryption(format!(
                    "key file for '{}' is not a valid RSA private key",
                    self.name
                ))
            })
    }

    /// Public half in OpenSSH `authorized_keys` form: `ssh-rsa <blob> <comment>`.
    ///
    /// # Errors
    ///
    /// Returns `Decryption` if the stored PEM cannot be parsed.
    pub fn public_key_openssh(&self) -> Result<String, ProvisionError> {
        let encoding =
            |e: ssh_key::Error| ProvisionError::LocalState(format!("key encoding failed: {e}"));
        let public = self.private_key()?.to_public_key();
        let key_data = ssh_key::public::RsaPublicKey::try_from(&public).map_err(encoding)?;
        ssh_key::PublicKey::new(key_data.into(), &self.name)
            .to_openssh()
            .map_err(encoding)
    }
}

/// Decrypt base64 password material with `key`.
///
/// Deterministic for a given blob and key. A mismatched key never yields
/// plaintext: either the padding check fails or the output is rejected as
/// not well-formed text.
///
/// # Errors
///
/// Returns `Decryption` if the blob is not base64, the key does not match,
/// or the plaintext is empty or contains control characters.
pub fn decrypt_password(blob: &str, key: &KeyMaterial) -> Result<String, ProvisionError> {
    let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
    let ciphertext = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProvisionError::Decryption(format!("password data is not base64: {e}")))?;
    let private = key.private_key()?;
    let plaintext = private.decrypt(Pkcs1v15Encrypt, &ciphertext).map_err(|_| {
        ProvisionError::Decryption(format!(
            "key '{}' does not match this instance's password data",
            key.name
        ))
    })?;
    let text = String::from_utf8(plaintext).map_err(|_| {
        ProvisionError::Decryption("decrypted password is not valid UTF-8".to_string())
    })?;
    if text.is_empty() {
        return Err(ProvisionError::Decryption(
            "decrypted password is empty".to_string(),
        ));
    }
    if text.chars().any(char::is_control) {
        return Err(ProvisionError::Decryption(
            "decrypted password contains control characters".to_string(),
        ));
    }
    Ok(text)
}
