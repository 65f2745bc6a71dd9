//! Passphrase based vaults.
//!
//! Layout:
//! ```text
//! --salt32bytes-iv-cypherText--
//! <base64 salt, 32 bytes>
//! <base64 IV>
//! <base64 ciphertext, wrapped>
//! ```
//! The key is PBKDF2-HMAC-SHA1 over the passphrase and salt (2000 rounds,
//! 32 bytes) and the cipher is AES-256-CBC.

use super::{VaultCodec, decode_wrapped, encode_wrapped, read_vault, strip_header, write_vault};
use crate::error::{ConfError, ConfResult};
use openssl::hash::MessageDigest;
use openssl::pkcs5;
use openssl::rand::rand_bytes;
use openssl::symm::{self, Cipher};
use std::path::Path;
use tracing::debug;

pub const SYMMETRIC_HEADER: &str = "--salt32bytes-iv-cypherText--";

const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;
const KDF_ROUNDS: usize = 2000;

/// Vault codec keyed by a passphrase.
pub struct SymmetricVault<'p> {
    passphrase: &'p str,
}

impl<'p> SymmetricVault<'p> {
    pub fn new(passphrase: &'p str) -> Self {
        Self { passphrase }
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], openssl::error::ErrorStack> {
        let mut key = [0; KEY_LEN];
        pkcs5::pbkdf2_hmac(
            self.passphrase.as_bytes(),
            salt,
            KDF_ROUNDS,
            MessageDigest::sha1(),
            &mut key,
        )?;
        Ok(key)
    }
}

impl VaultCodec for SymmetricVault<'_> {
    fn encode(&self, plaintext: &str, path: &Path) -> ConfResult<()> {
        if !super::has_vault_extension(path) {
            return Err(ConfError::wrong_extension_encrypt(path));
        }
        let cipher = Cipher::aes_256_cbc();

        let mut salt = [0u8; SALT_LEN];
        rand_bytes(&mut salt).map_err(|e| ConfError::encryption(path, e))?;
        let mut iv = vec![0u8; cipher.iv_len().unwrap_or(16)];
        rand_bytes(&mut iv).map_err(|e| ConfError::encryption(path, e))?;

        let key = self
            .derive_key(&salt)
            .map_err(|e| ConfError::encryption(path, e))?;
        let ciphertext = symm::encrypt(cipher, &key, Some(iv.as_slice()), plaintext.as_bytes())
            .map_err(|e| ConfError::encryption(path, e))?;

        let mut contents = String::new();
        contents.push_str(SYMMETRIC_HEADER);
        contents.push('\n');
        contents.push_str(&encode_wrapped(&salt));
        contents.push_str(&encode_wrapped(&iv));
        contents.push_str(&encode_wrapped(&ciphertext));
        write_vault(path, &contents)?;
        debug!("wrote symmetric vault {}", path.display());
        Ok(())
    }

    fn decode(&self, path: &Path) -> ConfResult<String> {
        let contents = read_vault(path)?;
        let mut lines = strip_header(path, &contents, SYMMETRIC_HEADER)?;

        let salt = lines
            .next()
            .ok_or_else(|| ConfError::decryption(path, "missing salt line"))
            .and_then(|line| {
                decode_wrapped(line).map_err(|e| ConfError::decryption(path, format!("salt: {e}")))
            })?;
        if salt.len() != SALT_LEN {
            return Err(ConfError::decryption(
                path,
                format!("salt must be {} bytes, found {}", SALT_LEN, salt.len()),
            ));
        }
        let iv = lines
            .next()
            .ok_or_else(|| ConfError::decryption(path, "missing IV line"))
            .and_then(|line| {
                decode_wrapped(line).map_err(|e| ConfError::decryption(path, format!("IV: {e}")))
            })?;
        let body: Vec<&str> = lines.collect();
        let ciphertext = decode_wrapped(&body.join("\n"))
            .map_err(|e| ConfError::decryption(path, format!("ciphertext: {e}")))?;

        let cipher = Cipher::aes_256_cbc();
        if Some(iv.len()) != cipher.iv_len() {
            return Err(ConfError::decryption(path, "IV has the wrong length"));
        }
        let key = self
            .derive_key(&salt)
            .map_err(|e| ConfError::decryption(path, e))?;
        // A wrong passphrase almost always surfaces here as a padding failure.
        let plaintext = symm::decrypt(cipher, &key, Some(iv.as_slice()), &ciphertext)
            .map_err(|_| ConfError::decryption(path, "bad pass phrase or corrupted data"))?;
        String::from_utf8(plaintext)
            .map_err(|_| ConfError::decryption(path, "bad pass phrase (plaintext is not UTF-8)"))
    }
}
