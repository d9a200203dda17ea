//! Signature artifacts decoded from scanned base64 text

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

use super::{signature_path, write_atomic, ArtifactError};

/// Scanned text was not a usable base64 signature
#[derive(Debug, Error)]
#[error("Invalid signature encoding: {reason}")]
pub struct InvalidSignatureEncoding {
    pub reason: String,
}

/// Raw signature bytes belonging to a signed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureArtifact {
    /// The file the signature was made over
    pub owner_file: PathBuf,

    /// Exact base64 decode of the scanned text
    pub raw_bytes: Vec<u8>,
}

impl SignatureArtifact {
    /// Decode scanned base64 text. Only surrounding whitespace is dropped.
    pub fn from_scanned(
        owner_file: &Path,
        scanned: &str,
    ) -> Result<Self, InvalidSignatureEncoding> {
        let text = scanned.trim();
        if text.is_empty() {
            return Err(InvalidSignatureEncoding {
                reason: "scanned signature is empty".to_string(),
            });
        }

        let raw_bytes = base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(|e| InvalidSignatureEncoding {
                reason: e.to_string(),
            })?;

        Ok(Self {
            owner_file: owner_file.to_path_buf(),
            raw_bytes,
        })
    }

    /// `<owner_file>.sig`
    pub fn path(&self) -> PathBuf {
        signature_path(&self.owner_file)
    }

    /// Write the raw bytes verbatim to `<owner_file>.sig`.
    pub fn persist(&self) -> Result<PathBuf, ArtifactError> {
        let path = self.path();
        write_atomic(&path, &self.raw_bytes)?;
        tracing::info!(path = %path.display(), bytes = self.raw_bytes.len(), "signature saved");
        Ok(path)
    }

    /// Load a previously persisted signature for `owner_file`.
    pub fn load(owner_file: &Path) -> Result<Self, ArtifactError> {
        let path = signature_path(owner_file);
        let raw_bytes = fs::read(&path).map_err(|source| ArtifactError::Read { path, source })?;
        Ok(Self {
            owner_file: owner_file.to_path_buf(),
            raw_bytes,
        })
    }

    /// Re-encode the raw bytes as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.raw_bytes)
    }
}
