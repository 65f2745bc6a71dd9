//! Encrypted configuration fragments.
//!
//! A vault is a `.enc` file holding a YAML document encrypted either with a
//! passphrase ([`SymmetricVault`]) or for a key-agent recipient
//! ([`AsymmetricVault`]). Both formats start with a header line naming their
//! layout and carry their binary fields as base64 text.

mod agent;
mod asymmetric;
mod passphrase;
mod symmetric;

pub use agent::KeyAgent;
pub use asymmetric::{ASYMMETRIC_HEADER, AsymmetricVault};
pub use passphrase::{FixedPassphrase, PassphraseCache, PassphrasePrompt, TerminalPrompt};
pub use symmetric::{SYMMETRIC_HEADER, SymmetricVault};

use crate::error::{ConfError, ConfResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// Required extension of every vault file.
pub const VAULT_EXTENSION: &str = "enc";

/// Width of wrapped base64 lines.
const BASE64_LINE: usize = 60;

/// Which codec produced (or should produce) a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultKind {
    Symmetric,
    Asymmetric,
}

impl VaultKind {
    pub fn header(&self) -> &'static str {
        match self {
            VaultKind::Symmetric => SYMMETRIC_HEADER,
            VaultKind::Asymmetric => ASYMMETRIC_HEADER,
        }
    }

    /// Identify a vault by its first line.
    pub fn sniff(contents: &str) -> Option<Self> {
        match contents.lines().next().map(str::trim) {
            Some(SYMMETRIC_HEADER) => Some(VaultKind::Symmetric),
            Some(ASYMMETRIC_HEADER) => Some(VaultKind::Asymmetric),
            _ => None,
        }
    }
}

/// Encode plaintext into a vault file and decode it back.
pub trait VaultCodec {
    fn encode(&self, plaintext: &str, path: &Path) -> ConfResult<()>;
    fn decode(&self, path: &Path) -> ConfResult<String>;
}

pub fn has_vault_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == VAULT_EXTENSION)
}

/// Check the preconditions shared by every decoder and read the file.
pub(crate) fn read_vault(path: &Path) -> ConfResult<String> {
    if !has_vault_extension(path) {
        return Err(ConfError::wrong_extension_decrypt(path));
    }
    if !path.is_file() {
        return Err(ConfError::vault_missing(path));
    }
    std::fs::read_to_string(path).map_err(|e| ConfError::decryption(path, e))
}

pub(crate) fn write_vault(path: &Path, contents: &str) -> ConfResult<()> {
    std::fs::write(path, contents).map_err(|e| ConfError::encryption(path, e))
}

/// Split off the header line, failing unless it matches `expected`.
pub(crate) fn strip_header<'c>(
    path: &Path,
    contents: &'c str,
    expected: &str,
) -> ConfResult<std::str::Lines<'c>> {
    let mut lines = contents.lines();
    let header = lines.next().unwrap_or("").trim();
    if header != expected {
        return Err(ConfError::bad_header(path, expected, header));
    }
    Ok(lines)
}

/// Base64 encode, wrapping lines at 60 characters.
pub(crate) fn encode_wrapped(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE + 1);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        // Base64 output is ASCII, so any chunk boundary is a char boundary.
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out
}

/// Base64 decode, ignoring any whitespace.
pub(crate) fn decode_wrapped(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}
