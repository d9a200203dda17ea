//! Public key certificates for air-gapped secp256k1 signers.
//!
//! The offline device exports its public key as raw SEC1 hex. Standard
//! verifiers want a PEM-armored SubjectPublicKeyInfo instead, so this crate
//! prepends the fixed DER header for the chosen point format and armors the
//! result. No ASN.1 library is involved: the headers are constants and must
//! stay bit-exact.

mod key;
mod owner;
mod pem;

pub use key::{KeyFormat, PublicKeyRecord};
pub use owner::{validate_owner, DEFAULT_OWNER};
pub use pem::{
    build_certificate, decode_certificate, PublicKeyCertificate, PEM_FOOTER, PEM_HEADER,
};

/// DER SubjectPublicKeyInfo header for a 65-byte uncompressed point.
///
/// ```text
/// 30 56                      SEQUENCE (86 bytes)
///   30 10                    SEQUENCE (16 bytes)
///     06 07 2A8648CE3D0201   OID 1.2.840.10045.2.1 (ecPublicKey)
///     06 05 2B8104000A       OID 1.3.132.0.10 (secp256k1)
///   03 42 00                 BIT STRING (66 bytes, 0 unused bits)
/// ```
pub const UNCOMPRESSED_PUBKEY_PREPEND: &str = "3056301006072A8648CE3D020106052B8104000A034200";

/// DER SubjectPublicKeyInfo header for a 33-byte compressed point.
///
/// Same layout as [`UNCOMPRESSED_PUBKEY_PREPEND`] with the outer SEQUENCE
/// length set to 0x36 and the BIT STRING length set to 0x22.
pub const COMPRESSED_PUBKEY_PREPEND: &str = "3036301006072A8648CE3D020106052B8104000A032200";

/// Errors from certificate construction
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("Malformed public key: {0}")]
    MalformedKey(String),

    #[error("Malformed public key certificate: {0}")]
    MalformedCertificate(String),

    #[error("Invalid owner name {owner:?}: {reason}")]
    InvalidOwner { owner: String, reason: String },
}

/// Result type for certificate operations
pub type CertificateResult<T> = Result<T, CertificateError>;
