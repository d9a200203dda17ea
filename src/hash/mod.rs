//! SHA-256 file digests and their `sha256sum`-style sidecar files

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::artifact::{digest_path, write_atomic, ArtifactError};

/// The only digest algorithm in use
pub const ALGORITHM: &str = "SHA-256";

/// Length of a hex-encoded SHA-256 digest
pub const HEX_DIGEST_LEN: usize = 64;

/// Errors from hashing or reading digest files
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Unable to read target file {}: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("Malformed digest file {}: {reason}", .path.display())]
    MalformedDigestFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// SHA-256 digest of a file's full, unmodified contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    source_path: PathBuf,
    hex_digest: String,
}

impl FileDigest {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// 64 lowercase hex characters
    pub fn hex_digest(&self) -> &str {
        &self.hex_digest
    }

    pub fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    /// `<hex digest> <source path>`, the sidecar file content
    pub fn sidecar_line(&self) -> String {
        format!("{} {}", self.hex_digest, self.source_path.display())
    }

    /// `<source path>.sha256sum.txt`
    pub fn sidecar_path(&self) -> PathBuf {
        digest_path(&self.source_path)
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash the full contents of `path`.
pub fn hash_file(path: &Path) -> Result<FileDigest, HashError> {
    let unreadable = |source| HashError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    tracing::debug!(path = %path.display(), "hashing file");
    let file = File::open(path).map_err(unreadable)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(unreadable)?;

    let hex_digest = hex::encode(hasher.finalize());
    tracing::debug!(path = %path.display(), digest = %hex_digest, "file hashed");

    Ok(FileDigest {
        source_path: path.to_path_buf(),
        hex_digest,
    })
}

/// Write `<hex> <path>` to `<path>.sha256sum.txt`, replacing any previous file.
pub fn persist_digest(digest: &FileDigest) -> Result<PathBuf, HashError> {
    let path = digest.sidecar_path();
    write_atomic(&path, digest.sidecar_line().as_bytes())?;
    tracing::info!(path = %path.display(), digest = %digest.hex_digest, "digest saved");
    Ok(path)
}

/// Parsed content of a digest sidecar file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    pub hex_digest: String,
    pub file_name: String,
}

/// Parse `<hex> <name>` as written by [`persist_digest`].
///
/// `sha256sum` output (two spaces, or `*` for binary mode) is accepted too.
pub fn parse_digest_line(text: &str) -> Result<DigestLine, String> {
    let line = text.lines().next().unwrap_or_default().trim_end();
    let (hex_digest, rest) = line
        .split_once(' ')
        .ok_or_else(|| "expected '<digest> <file>'".to_string())?;

    if hex_digest.len() != HEX_DIGEST_LEN
        || !hex_digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(format!(
            "digest must be {} lowercase hex characters",
            HEX_DIGEST_LEN
        ));
    }

    let file_name = rest.trim_start_matches(' ').trim_start_matches('*');
    if file_name.is_empty() {
        return Err("missing file name".to_string());
    }

    Ok(DigestLine {
        hex_digest: hex_digest.to_string(),
        file_name: file_name.to_string(),
    })
}

/// Read and parse the digest sidecar of `file`.
pub fn read_digest_file(file: &Path) -> Result<DigestLine, HashError> {
    let path = digest_path(file);
    let text = fs::read_to_string(&path).map_err(|source| ArtifactError::Read {
        path: path.clone(),
        source,
    })?;
    parse_digest_line(&text).map_err(|reason| HashError::MalformedDigestFile { path, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_empty_file_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let digest = hash_file(&path).unwrap();
        assert_eq!(digest.hex_digest(), EMPTY_SHA256);
        assert_eq!(digest.algorithm(), "SHA-256");
    }

    #[test]
    fn test_digest_is_deterministic_lowercase_hex() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, b"hello krux\n").unwrap();

        let a = hash_file(&path).unwrap();
        let b = hash_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.hex_digest(),
            "cdc6dcb997218ba01f2c41028d57cd790598b95c8c00b3772f7f26bbbdb2acfc"
        );
        assert_eq!(a.hex_digest().len(), HEX_DIGEST_LEN);
        assert_eq!(a.hex_digest(), a.hex_digest().to_lowercase());
        assert_eq!(a.hex_digest(), hash_bytes(b"hello krux\n"));
    }

    #[test]
    fn test_large_file_matches_in_memory_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("large.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap().hex_digest(), hash_bytes(&data));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.txt");

        let err = hash_file(&path).unwrap_err();
        assert!(matches!(err, HashError::Unreadable { .. }));
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_digest_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, b"contents").unwrap();

        let digest = hash_file(&path).unwrap();
        let written = persist_digest(&digest).unwrap();
        assert_eq!(written, dir.path().join("doc.txt.sha256sum.txt"));

        let content = fs::read_to_string(&written).unwrap();
        assert_eq!(content, format!("{} {}", digest.hex_digest(), path.display()));

        let parsed = read_digest_file(&path).unwrap();
        assert_eq!(parsed.hex_digest, digest.hex_digest());
        assert_eq!(parsed.file_name, path.display().to_string());
    }

    #[test]
    fn test_parse_sha256sum_format() {
        let parsed = parse_digest_line(&format!("{}  doc.txt\n", EMPTY_SHA256)).unwrap();
        assert_eq!(parsed.file_name, "doc.txt");

        let parsed = parse_digest_line(&format!("{} *doc.txt", EMPTY_SHA256)).unwrap();
        assert_eq!(parsed.file_name, "doc.txt");
    }

    #[test]
    fn test_parse_rejects_bad_digest() {
        assert!(parse_digest_line("abc doc.txt").is_err());
        assert!(parse_digest_line(&format!("{} doc.txt", EMPTY_SHA256.to_uppercase())).is_err());
        assert!(parse_digest_line(EMPTY_SHA256).is_err());
        assert!(parse_digest_line(&format!("{} ", EMPTY_SHA256)).is_err());
    }
}
