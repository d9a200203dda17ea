//! Verification coordinator
//!
//! Checks a (file, signature, public key certificate) triple the way
//! `openssl sha256 -verify <pem> -signature <sig> <file>` would: ECDSA over
//! secp256k1 with the SHA-256 digest of the file.
//!
//! Three outcomes are kept apart:
//! - an input could not be read: [`VerifyError::MissingInput`]
//! - the certificate could not be used: [`VerifyError::VerificationEngine`]
//! - the check ran: [`VerificationResult`] with `ok` true or false

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::pkcs8::DecodePublicKey;
use serde::Serialize;
use thiserror::Error;

use super::ErrorClass;
use crate::hash::{self, HashError};

/// Which of the three inputs a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    File,
    PublicKey,
    Signature,
}

impl std::fmt::Display for InputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputRole::File => write!(f, "file"),
            InputRole::PublicKey => write!(f, "public key certificate"),
            InputRole::Signature => write!(f, "signature"),
        }
    }
}

/// Errors that prevent a verification from running
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Unable to read {role} {}: {source}", .path.display())]
    MissingInput {
        role: InputRole,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Verification engine error: {0}")]
    VerificationEngine(String),
}

impl VerifyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            VerifyError::MissingInput { .. } => ErrorClass::Input,
            VerifyError::VerificationEngine(_) => ErrorClass::Engine,
        }
    }
}

/// Paths of the triple to check
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub file: PathBuf,
    pub pubkey_pem: PathBuf,
    pub signature: PathBuf,
}

/// Outcome of a verification that ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub ok: bool,
    pub detail: String,
}

/// What a verifier concluded about a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

/// A signature scheme check over a precomputed SHA-256 digest.
pub trait SignatureVerifier {
    /// Check `signature` over `digest` against the key in `pem_text`.
    ///
    /// An unusable certificate is an error; an unusable or non-matching
    /// signature is [`Verdict::Invalid`].
    fn verify(
        &self,
        digest: &[u8; 32],
        pem_text: &str,
        signature: &[u8],
    ) -> Result<Verdict, VerifyError>;
}

/// ECDSA/secp256k1 verifier backed by `k256`
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(
        &self,
        digest: &[u8; 32],
        pem_text: &str,
        signature: &[u8],
    ) -> Result<Verdict, VerifyError> {
        let der = ksigner_cert::decode_certificate(pem_text)
            .map_err(|e| VerifyError::VerificationEngine(e.to_string()))?;
        let key = VerifyingKey::from_public_key_der(&der).map_err(|e| {
            VerifyError::VerificationEngine(format!("not a secp256k1 public key: {}", e))
        })?;

        let signature = match parse_signature(signature) {
            Ok(signature) => signature,
            Err(reason) => return Ok(Verdict::Invalid(reason)),
        };

        match key.verify_prehash(digest, &signature) {
            Ok(()) => Ok(Verdict::Valid),
            Err(_) => Ok(Verdict::Invalid(
                "signature does not match the file and public key".to_string(),
            )),
        }
    }
}

/// Accept DER (what the device and openssl emit) or 64-byte `r||s`.
/// High-S values are normalized since openssl accepts both forms.
fn parse_signature(bytes: &[u8]) -> Result<Signature, String> {
    let signature = Signature::from_der(bytes)
        .or_else(|_| Signature::from_slice(bytes))
        .map_err(|_| {
            format!(
                "signature is neither DER nor 64-byte r||s ({} bytes)",
                bytes.len()
            )
        })?;
    Ok(signature.normalize_s().unwrap_or(signature))
}

/// Reads the triple and hands the bytes to a [`SignatureVerifier`]
#[derive(Debug, Clone, Default)]
pub struct VerificationCoordinator<V = Secp256k1Verifier> {
    verifier: V,
}

impl<V: SignatureVerifier> VerificationCoordinator<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    pub fn verify(&self, request: &VerificationRequest) -> Result<VerificationResult, VerifyError> {
        let file_digest = hash::hash_file(&request.file).map_err(|e| match e {
            HashError::Unreadable { path, source } => VerifyError::MissingInput {
                role: InputRole::File,
                path,
                source,
            },
            other => VerifyError::VerificationEngine(other.to_string()),
        })?;
        let mut digest = [0u8; 32];
        hex::decode_to_slice(file_digest.hex_digest(), &mut digest)
            .map_err(|e| VerifyError::VerificationEngine(e.to_string()))?;

        let pem_bytes = read_input(InputRole::PublicKey, &request.pubkey_pem)?;
        let pem_text = String::from_utf8(pem_bytes).map_err(|_| {
            VerifyError::VerificationEngine(format!(
                "{} is not a text PEM file",
                request.pubkey_pem.display()
            ))
        })?;
        let signature = read_input(InputRole::Signature, &request.signature)?;

        tracing::debug!(
            file = %request.file.display(),
            digest = %file_digest.hex_digest(),
            signature_bytes = signature.len(),
            "verifying"
        );

        let result = match self.verifier.verify(&digest, &pem_text, &signature)? {
            Verdict::Valid => VerificationResult {
                ok: true,
                detail: "Verified OK".to_string(),
            },
            Verdict::Invalid(reason) => VerificationResult {
                ok: false,
                detail: format!("Verification failure: {}", reason),
            },
        };

        if result.ok {
            tracing::info!(file = %request.file.display(), "signature valid");
        } else {
            tracing::warn!(file = %request.file.display(), detail = %result.detail, "signature invalid");
        }
        Ok(result)
    }
}

fn read_input(role: InputRole, path: &Path) -> Result<Vec<u8>, VerifyError> {
    fs::read(path).map_err(|source| VerifyError::MissingInput {
        role,
        path: path.to_path_buf(),
        source,
    })
}

/// Verify `signature` over `file` against the certificate at `pubkey_pem`.
pub fn verify(
    file: &Path,
    pubkey_pem: &Path,
    signature: &Path,
) -> Result<VerificationResult, VerifyError> {
    let request = VerificationRequest {
        file: file.to_path_buf(),
        pubkey_pem: pubkey_pem.to_path_buf(),
        signature: signature.to_path_buf(),
    };
    VerificationCoordinator::new(Secp256k1Verifier).verify(&request)
}
