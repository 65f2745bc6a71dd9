//! Recipient-key vaults.
//!
//! Layout:
//! ```text
//! --recipientUID-cypherText--
//! <recipient identifier>
//! <base64 envelope, wrapped>
//! ```
//! The envelope is a big-endian `u16` length, the RSA-OAEP wrapped content
//! key, the IV and finally the AES-256-CBC ciphertext.

use super::{KeyAgent, VaultCodec, decode_wrapped, encode_wrapped, read_vault, strip_header, write_vault};
use crate::error::{ConfError, ConfResult};
use openssl::encrypt::{Decrypter, Encrypter};
use openssl::hash::MessageDigest;
use openssl::rand::rand_bytes;
use openssl::rsa::Padding;
use openssl::symm::{self, Cipher};
use std::path::Path;
use tracing::debug;

pub const ASYMMETRIC_HEADER: &str = "--recipientUID-cypherText--";

const CONTENT_KEY_LEN: usize = 32;

/// Vault codec sealed for a key-agent recipient.
#[derive(Debug, Clone, Default)]
pub struct AsymmetricVault {
    recipient: Option<String>,
    agent: Option<KeyAgent>,
}

impl AsymmetricVault {
    pub fn new(recipient: Option<String>, agent: Option<KeyAgent>) -> Self {
        Self { recipient, agent }
    }

    fn session(&self, on_missing: fn(String) -> ConfError) -> ConfResult<(&str, &KeyAgent)> {
        let recipient = self
            .recipient
            .as_deref()
            .ok_or_else(|| on_missing("no vault recipient is configured (vault.recipient)".into()))?;
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| on_missing("no key-agent session is active".into()))?;
        Ok((recipient, agent))
    }
}

impl VaultCodec for AsymmetricVault {
    fn encode(&self, plaintext: &str, path: &Path) -> ConfResult<()> {
        if !super::has_vault_extension(path) {
            return Err(ConfError::wrong_extension_encrypt(path));
        }
        let (recipient, agent) = self.session(ConfError::Encryption)?;
        let public = agent.public_key(recipient)?;
        let fail = |e: openssl::error::ErrorStack| ConfError::encryption(path, e);

        let cipher = Cipher::aes_256_cbc();
        let mut content_key = [0u8; CONTENT_KEY_LEN];
        rand_bytes(&mut content_key).map_err(fail)?;
        let mut iv = vec![0u8; cipher.iv_len().unwrap_or(16)];
        rand_bytes(&mut iv).map_err(fail)?;
        let ciphertext =
            symm::encrypt(cipher, &content_key, Some(iv.as_slice()), plaintext.as_bytes())
                .map_err(fail)?;

        let mut encrypter = Encrypter::new(&public).map_err(fail)?;
        encrypter.set_rsa_padding(Padding::PKCS1_OAEP).map_err(fail)?;
        encrypter.set_rsa_mgf1_md(MessageDigest::sha1()).map_err(fail)?;
        encrypter.set_rsa_oaep_md(MessageDigest::sha1()).map_err(fail)?;
        let mut wrapped = vec![0; encrypter.encrypt_len(&content_key).map_err(fail)?];
        let wrapped_len = encrypter.encrypt(&content_key, &mut wrapped).map_err(fail)?;
        wrapped.truncate(wrapped_len);

        let wrapped_len = u16::try_from(wrapped.len())
            .map_err(|_| ConfError::encryption(path, "recipient key is too large"))?;
        let mut envelope = Vec::with_capacity(2 + wrapped.len() + iv.len() + ciphertext.len());
        envelope.extend_from_slice(&wrapped_len.to_be_bytes());
        envelope.extend_from_slice(&wrapped);
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&ciphertext);

        let contents = format!(
            "{}\n{}\n{}",
            ASYMMETRIC_HEADER,
            recipient,
            encode_wrapped(&envelope)
        );
        write_vault(path, &contents)?;
        debug!("wrote vault {} for recipient {}", path.display(), recipient);
        Ok(())
    }

    fn decode(&self, path: &Path) -> ConfResult<String> {
        let contents = read_vault(path)?;
        let mut lines = strip_header(path, &contents, ASYMMETRIC_HEADER)?;
        let (recipient, agent) = self.session(ConfError::Decryption)?;

        let found = lines.next().unwrap_or("").trim();
        if found != recipient {
            return Err(ConfError::decryption(
                path,
                format!("it is sealed for recipient [{found}], not the configured [{recipient}]"),
            ));
        }
        let body: Vec<&str> = lines.collect();
        let envelope = decode_wrapped(&body.join("\n"))
            .map_err(|e| ConfError::decryption(path, format!("envelope: {e}")))?;

        let cipher = Cipher::aes_256_cbc();
        let iv_len = cipher.iv_len().unwrap_or(16);
        let truncated = || ConfError::decryption(path, "envelope is truncated");
        let (len_bytes, rest) = envelope.split_first_chunk::<2>().ok_or_else(truncated)?;
        let wrapped_len = usize::from(u16::from_be_bytes(*len_bytes));
        if rest.len() < wrapped_len + iv_len {
            return Err(truncated());
        }
        let (wrapped, rest) = rest.split_at(wrapped_len);
        let (iv, ciphertext) = rest.split_at(iv_len);

        let private = agent.private_key(recipient)?;
        let fail = |e: openssl::error::ErrorStack| ConfError::decryption(path, e);
        let mut decrypter = Decrypter::new(&private).map_err(fail)?;
        decrypter.set_rsa_padding(Padding::PKCS1_OAEP).map_err(fail)?;
        decrypter.set_rsa_mgf1_md(MessageDigest::sha1()).map_err(fail)?;
        decrypter.set_rsa_oaep_md(MessageDigest::sha1()).map_err(fail)?;
        let mut content_key = vec![0; decrypter.decrypt_len(wrapped).map_err(fail)?];
        let key_len = decrypter.decrypt(wrapped, &mut content_key).map_err(fail)?;
        content_key.truncate(key_len);
        if content_key.len() != CONTENT_KEY_LEN {
            return Err(ConfError::decryption(path, "content key has the wrong length"));
        }

        let plaintext = symm::decrypt(cipher, &content_key, Some(iv), ciphertext)
            .map_err(|_| ConfError::decryption(path, "corrupted ciphertext"))?;
        String::from_utf8(plaintext)
            .map_err(|_| ConfError::decryption(path, "plaintext is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;
    use tempfile::TempDir;

    const DOC: &str = "deploy:\n  token: s3cr3t\n";

    fn agent_with(recipients: &[&str]) -> (TempDir, KeyAgent) {
        let dir = TempDir::new().unwrap();
        for recipient in recipients {
            let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
            std::fs::write(
                dir.path().join(format!("{recipient}.pem")),
                key.private_key_to_pem_pkcs8().unwrap(),
            )
            .unwrap();
        }
        let agent = KeyAgent::new(dir.path());
        (dir, agent)
    }

    #[test]
    fn test_round_trip() {
        let (keys, agent) = agent_with(&["ops"]);
        let path = keys.path().join("site.enc");
        let vault = AsymmetricVault::new(Some("ops".into()), Some(agent));
        vault.encode(DOC, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some(ASYMMETRIC_HEADER));
        assert_eq!(lines.next(), Some("ops"));
        assert_eq!(vault.decode(&path).unwrap(), DOC);
    }

    #[test]
    fn test_recipient_mismatch_fails() {
        let (keys, agent) = agent_with(&["ops", "dev"]);
        let path = keys.path().join("site.enc");
        AsymmetricVault::new(Some("ops".into()), Some(agent.clone()))
            .encode(DOC, &path)
            .unwrap();

        let err = AsymmetricVault::new(Some("dev".into()), Some(agent))
            .decode(&path)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DecryptionError);
        assert!(err.to_string().contains("[ops]"));
    }

    #[test]
    fn test_requires_recipient_and_agent() {
        let (keys, agent) = agent_with(&["ops"]);
        let path = keys.path().join("site.enc");

        let err = AsymmetricVault::new(None, Some(agent)).encode(DOC, &path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EncryptionError);

        let err = AsymmetricVault::new(Some("ops".into()), None)
            .encode(DOC, &path)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EncryptionError);
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupted_header() {
        let (keys, agent) = agent_with(&["ops"]);
        let path = keys.path().join("site.enc");
        let vault = AsymmetricVault::new(Some("ops".into()), Some(agent));
        vault.encode(DOC, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, written.replacen("recipientUID", "recipient", 1)).unwrap();

        let err = vault.decode(&path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DecryptionError);
        assert!(err.to_string().contains("header"));
    }
}
