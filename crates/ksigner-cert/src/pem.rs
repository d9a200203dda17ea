//! PEM armoring of SubjectPublicKeyInfo bytes.

use base64::Engine;

use crate::{validate_owner, CertificateError, CertificateResult, KeyFormat, PublicKeyRecord};

/// First line of a PEM public key block
pub const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";

/// Last line of a PEM public key block
pub const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// A PEM public key certificate named after its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyCertificate {
    /// Owner name, used verbatim as the `<owner>.pem` file stem
    pub owner: String,

    /// Header, single-line base64 body and footer joined by `\n`.
    /// There is no trailing newline.
    pub pem_text: String,
}

impl PublicKeyCertificate {
    /// File name the certificate is persisted under.
    pub fn file_name(&self) -> String {
        format!("{}.pem", self.owner)
    }

    /// Base64 body between the armor lines.
    pub fn body(&self) -> &str {
        self.pem_text
            .strip_prefix(PEM_HEADER)
            .and_then(|rest| rest.strip_suffix(PEM_FOOTER))
            .map(|body| body.trim_matches('\n'))
            .unwrap_or_default()
    }
}

impl PublicKeyRecord {
    /// Encode this key as a PEM certificate for `owner`.
    pub fn to_certificate(&self, owner: &str) -> CertificateResult<PublicKeyCertificate> {
        validate_owner(owner)?;

        let b64 = base64::engine::general_purpose::STANDARD.encode(self.der_bytes());
        let pem_text = [PEM_HEADER, b64.as_str(), PEM_FOOTER].join("\n");

        Ok(PublicKeyCertificate {
            owner: owner.to_string(),
            pem_text,
        })
    }
}

/// Build a PEM public key certificate from scanned hex.
///
/// Fails with `MalformedKey` on any hex, length or leading-byte problem and
/// with `InvalidOwner` when the owner cannot be used as a file stem. Nothing
/// is returned on failure, so callers never see a partial certificate.
pub fn build_certificate(
    hex_pubkey: &str,
    compressed: bool,
    owner: &str,
) -> CertificateResult<PublicKeyCertificate> {
    let format = KeyFormat::from_uncompressed_flag(!compressed);
    PublicKeyRecord::parse(hex_pubkey, format)?.to_certificate(owner)
}

/// Strip the PEM armor from a public key certificate and decode its body.
///
/// Accepts the single-line body written by [`build_certificate`] as well as
/// 64-column wrapped bodies and CRLF line endings.
pub fn decode_certificate(pem_text: &str) -> CertificateResult<Vec<u8>> {
    let malformed = |reason: &str| CertificateError::MalformedCertificate(reason.to_string());

    let mut lines = pem_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    if lines.next() != Some(PEM_HEADER) {
        return Err(malformed("missing BEGIN PUBLIC KEY line"));
    }

    let mut body = String::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line == PEM_FOOTER {
            closed = true;
            break;
        }
        body.push_str(line);
    }

    if !closed {
        return Err(malformed("missing END PUBLIC KEY line"));
    }
    if lines.next().is_some() {
        return Err(malformed("unexpected data after END PUBLIC KEY line"));
    }
    if body.is_empty() {
        return Err(malformed("empty body"));
    }

    base64::engine::general_purpose::STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CertificateError::MalformedCertificate(format!("invalid base64 body: {}", e)))
}
