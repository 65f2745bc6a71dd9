//! Structured error types for configuration resolution.

use crate::config::MissingKey;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Merge errors
    TypeConflict,

    // Lookup errors
    MissingKey,
    WrongType,
    InvalidPath,
    ResourceNotFound,

    // Vault errors
    EncryptionError,
    DecryptionError,

    // Fragment and I/O errors
    FragmentError,
    IoError,
    RecipeLoadError,
    PromptError,
}

/// Errors raised while loading, merging or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfError {
    /// A merge tried to combine incompatible value kinds.
    #[error("attempting to merge {incoming} into an existing {existing} key [{path}]")]
    TypeConflict {
        path: String,
        incoming: &'static str,
        existing: &'static str,
    },

    /// A traced lookup missed. Carries the access trace for the diagnostic.
    #[error("could not find the key [{}] in the configuration path [{}]", .0.key(), .0.path())]
    MissingKey(Box<MissingKey>),

    /// A traced lookup found a value of the wrong kind.
    #[error("expected {expected} at [{path}] but found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid configuration path [{0}]")]
    InvalidPath(String),

    #[error("resource file {0} could not be found")]
    ResourceNotFound(String),

    #[error("{0}")]
    Encryption(String),

    #[error("{0}")]
    Decryption(String),

    #[error("failed to parse configuration fragment {path}")]
    Fragment {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration fragment {path} must contain a mapping at the top level")]
    FragmentShape { path: PathBuf },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load recipe file {path}")]
    RecipeLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("pass phrase prompt failed: {0}")]
    Prompt(String),
}

impl ConfError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfError::TypeConflict { .. } => ErrorCode::TypeConflict,
            ConfError::MissingKey(_) => ErrorCode::MissingKey,
            ConfError::WrongType { .. } => ErrorCode::WrongType,
            ConfError::InvalidPath(_) => ErrorCode::InvalidPath,
            ConfError::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            ConfError::Encryption(_) => ErrorCode::EncryptionError,
            ConfError::Decryption(_) => ErrorCode::DecryptionError,
            ConfError::Fragment { .. } | ConfError::FragmentShape { .. } => {
                ErrorCode::FragmentError
            }
            ConfError::Io { .. } => ErrorCode::IoError,
            ConfError::RecipeLoad { .. } => ErrorCode::RecipeLoadError,
            ConfError::Prompt(_) => ErrorCode::PromptError,
        }
    }

    // Convenience constructors

    pub fn type_conflict(path: impl Into<String>, incoming: &'static str, existing: &'static str) -> Self {
        ConfError::TypeConflict {
            path: path.into(),
            incoming,
            existing,
        }
    }

    pub fn wrong_type(path: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        ConfError::WrongType {
            path: path.into(),
            expected,
            found,
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        ConfError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn wrong_extension_encrypt(path: &Path) -> Self {
        ConfError::Encryption(format!(
            "The file in which to store the encrypted data ({}) MUST have the file extension '.enc'",
            path.display()
        ))
    }

    pub fn wrong_extension_decrypt(path: &Path) -> Self {
        ConfError::Decryption(format!(
            "The encrypted file ({}) MUST have the file extension '.enc'",
            path.display()
        ))
    }

    pub fn vault_missing(path: &Path) -> Self {
        ConfError::Decryption(format!(
            "The encrypted file ({}) does not exist",
            path.display()
        ))
    }

    pub fn bad_header(path: &Path, expected: &str, found: &str) -> Self {
        ConfError::Decryption(format!(
            "Attempting to decrypt {} which does not start with the {} header (header line: [{}])",
            path.display(),
            expected,
            found
        ))
    }

    pub fn decryption(path: &Path, reason: impl std::fmt::Display) -> Self {
        ConfError::Decryption(format!("Could not decrypt {}: {}", path.display(), reason))
    }

    pub fn encryption(path: &Path, reason: impl std::fmt::Display) -> Self {
        ConfError::Encryption(format!("Could not encrypt {}: {}", path.display(), reason))
    }

    pub fn is_missing_key(&self) -> bool {
        matches!(self, ConfError::MissingKey(_))
    }
}

impl From<MissingKey> for ConfError {
    fn from(missing: MissingKey) -> Self {
        ConfError::MissingKey(Box::new(missing))
    }
}

/// Result type for configuration operations.
pub type ConfResult<T> = std::result::Result<T, ConfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_serialize_screaming() {
        let json = serde_json::to_string(&ErrorCode::TypeConflict).unwrap();
        assert_eq!(json, "\"TYPE_CONFLICT\"");
        let json = serde_json::to_string(&ErrorCode::DecryptionError).unwrap();
        assert_eq!(json, "\"DECRYPTION_ERROR\"");
    }

    #[test]
    fn test_type_conflict_message() {
        let err = ConfError::type_conflict("ssh.cmdOptions", "a sequence", "non-sequence");
        assert_eq!(err.code(), ErrorCode::TypeConflict);
        assert_eq!(
            err.to_string(),
            "attempting to merge a sequence into an existing non-sequence key [ssh.cmdOptions]"
        );
    }

    #[test]
    fn test_vault_constructors_classify() {
        let path = Path::new("secrets.yaml");
        assert_eq!(
            ConfError::wrong_extension_encrypt(path).code(),
            ErrorCode::EncryptionError
        );
        assert_eq!(
            ConfError::wrong_extension_decrypt(path).code(),
            ErrorCode::DecryptionError
        );
        assert!(
            ConfError::vault_missing(path)
                .to_string()
                .contains("does not exist")
        );
    }
}
