//! Key-agent session holding recipient key pairs.
//!
//! An active session is a directory of PEM files: `<recipient>.pem` holds a
//! recipient's private key and `<recipient>.pub.pem` its public key. The
//! public key is derived from the private one when only the latter exists.

use crate::error::{ConfError, ConfResult};
use openssl::pkey::{PKey, Private, Public};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAgent {
    key_dir: PathBuf,
}

impl KeyAgent {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    fn key_file(&self, recipient: &str, suffix: &str) -> Option<PathBuf> {
        let valid = !recipient.is_empty()
            && recipient != "."
            && recipient != ".."
            && !recipient.contains(['/', '\\']);
        valid.then(|| self.key_dir.join(format!("{recipient}{suffix}")))
    }

    /// Private key of `recipient`, needed to open a vault.
    pub fn private_key(&self, recipient: &str) -> ConfResult<PKey<Private>> {
        let path = self.key_file(recipient, ".pem").ok_or_else(|| {
            ConfError::Decryption(format!("invalid recipient identifier [{recipient}]"))
        })?;
        let pem = std::fs::read(&path).map_err(|_| {
            ConfError::Decryption(format!(
                "the key agent holds no private key for recipient [{recipient}]"
            ))
        })?;
        PKey::private_key_from_pem(&pem).map_err(|e| ConfError::decryption(&path, e))
    }

    /// Public key of `recipient`, enough to seal a vault.
    pub fn public_key(&self, recipient: &str) -> ConfResult<PKey<Public>> {
        let path = self.key_file(recipient, ".pub.pem").ok_or_else(|| {
            ConfError::Encryption(format!("invalid recipient identifier [{recipient}]"))
        })?;
        if let Ok(pem) = std::fs::read(&path) {
            return PKey::public_key_from_pem(&pem).map_err(|e| ConfError::encryption(&path, e));
        }
        let private = self
            .private_key(recipient)
            .map_err(|_| {
                ConfError::Encryption(format!(
                    "the key agent holds no key for recipient [{recipient}]"
                ))
            })?;
        let pem = private
            .public_key_to_pem()
            .map_err(|e| ConfError::encryption(&path, e))?;
        PKey::public_key_from_pem(&pem).map_err(|e| ConfError::encryption(&path, e))
    }
}
