//! Persisted workflow artifacts
//!
//! Every artifact lives beside the signed file:
//! - `<file>.sha256sum.txt`: one line, `<hex digest> <file>`
//! - `<file>.sig`: raw signature bytes, no envelope
//! - `<dir of file>/<owner>.pem`: PEM public key certificate
//!
//! Writes go to a hidden temp file in the same directory and are renamed
//! into place, so a reader never observes a half-written artifact.

mod signature;

pub use signature::{InvalidSignatureEncoding, SignatureArtifact};

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ksigner_cert::PublicKeyCertificate;
use thiserror::Error;

/// Suffix of the digest sidecar
pub const DIGEST_SUFFIX: &str = ".sha256sum.txt";

/// Suffix of the signature file
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Errors reading or writing artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to remove {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// `<file>.sha256sum.txt`
pub fn digest_path(file: &Path) -> PathBuf {
    append_suffix(file, DIGEST_SUFFIX)
}

/// `<file>.sig`
pub fn signature_path(file: &Path) -> PathBuf {
    append_suffix(file, SIGNATURE_SUFFIX)
}

/// Directory certificates for `file` are written to.
pub fn certificate_dir(file: &Path) -> PathBuf {
    file.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// `<dir>/<owner>.pem`
pub fn certificate_path(dir: &Path, owner: &str) -> PathBuf {
    dir.join(format!("{}.pem", owner))
}

fn append_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = file.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `contents` to `path` all-or-nothing (write-then-rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ArtifactError> {
    let write_err = |source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path.file_name().ok_or_else(|| {
        write_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "artifact path has no file name",
        ))
    })?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    if let Err(e) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    Ok(())
}

/// Remove `<file>.sig` left by an earlier run. Returns whether one existed.
pub fn discard_signature(file: &Path) -> Result<bool, ArtifactError> {
    let path = signature_path(file);
    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "stale signature removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ArtifactError::Remove { path, source }),
    }
}

/// Persist a certificate as `<dir>/<owner>.pem`, returning the path written.
pub fn persist_certificate(
    certificate: &PublicKeyCertificate,
    dir: &Path,
) -> Result<PathBuf, ArtifactError> {
    let path = dir.join(certificate.file_name());
    write_atomic(&path, certificate.pem_text.as_bytes())?;
    tracing::info!(path = %path.display(), owner = %certificate.owner, "public key certificate saved");
    Ok(path)
}
