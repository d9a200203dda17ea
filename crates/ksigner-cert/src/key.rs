//! Scanned public key records.

use crate::{
    CertificateError, CertificateResult, COMPRESSED_PUBKEY_PREPEND, UNCOMPRESSED_PUBKEY_PREPEND,
};

const COMPRESSED_HEADER: [u8; 23] = [
    0x30, 0x36, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x22, 0x00,
];

const UNCOMPRESSED_HEADER: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

/// SEC1 point encoding of a scanned public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFormat {
    /// 33 bytes, leading `02` or `03`
    #[default]
    Compressed,
    /// 65 bytes, leading `04`
    Uncompressed,
}

impl KeyFormat {
    /// Pick the format from an "uncompressed" flag.
    pub fn from_uncompressed_flag(uncompressed: bool) -> Self {
        if uncompressed {
            KeyFormat::Uncompressed
        } else {
            KeyFormat::Compressed
        }
    }

    /// Raw key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            KeyFormat::Compressed => 33,
            KeyFormat::Uncompressed => 65,
        }
    }

    /// Hex-encoded DER header prepended to the raw key.
    pub fn der_prepend(&self) -> &'static str {
        match self {
            KeyFormat::Compressed => COMPRESSED_PUBKEY_PREPEND,
            KeyFormat::Uncompressed => UNCOMPRESSED_PUBKEY_PREPEND,
        }
    }

    /// The same header as raw bytes.
    pub fn der_prepend_bytes(&self) -> &'static [u8] {
        match self {
            KeyFormat::Compressed => &COMPRESSED_HEADER,
            KeyFormat::Uncompressed => &UNCOMPRESSED_HEADER,
        }
    }

    fn allowed_leading_bytes(&self) -> &'static [u8] {
        match self {
            KeyFormat::Compressed => &[0x02, 0x03],
            KeyFormat::Uncompressed => &[0x04],
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            KeyFormat::Compressed => "compressed",
            KeyFormat::Uncompressed => "uncompressed",
        }
    }
}

impl std::fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public key captured from the signing device, validated for its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    hex_pubkey: String,
    bytes: Vec<u8>,
    format: KeyFormat,
}

impl PublicKeyRecord {
    /// Validate scanned hex text against the declared format.
    ///
    /// Surrounding whitespace is ignored and the hex is normalized to
    /// lowercase. Length, hex alphabet and the SEC1 leading byte are all
    /// checked, so a truncated scan can never reach the encoder.
    pub fn parse(text: &str, format: KeyFormat) -> CertificateResult<Self> {
        let hex_pubkey = text.trim().to_ascii_lowercase();
        let expected_chars = format.key_len() * 2;

        if hex_pubkey.len() != expected_chars {
            return Err(CertificateError::MalformedKey(format!(
                "{} key must be {} hex characters, got {}",
                format,
                expected_chars,
                hex_pubkey.len()
            )));
        }

        let bytes = hex::decode(&hex_pubkey)
            .map_err(|e| CertificateError::MalformedKey(format!("invalid hex: {}", e)))?;

        if !format.allowed_leading_bytes().contains(&bytes[0]) {
            let expected: Vec<String> = format
                .allowed_leading_bytes()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect();
            return Err(CertificateError::MalformedKey(format!(
                "{} key must start with {}, got {:02x}",
                format,
                expected.join(" or "),
                bytes[0]
            )));
        }

        Ok(Self {
            hex_pubkey,
            bytes,
            format,
        })
    }

    /// Lowercase hex of the raw SEC1 point.
    pub fn hex(&self) -> &str {
        &self.hex_pubkey
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    pub fn is_compressed(&self) -> bool {
        self.format == KeyFormat::Compressed
    }

    /// DER SubjectPublicKeyInfo bytes: fixed header followed by the point.
    pub fn der_bytes(&self) -> Vec<u8> {
        let header = self.format.der_prepend_bytes();
        let mut der = Vec::with_capacity(header.len() + self.bytes.len());
        der.extend_from_slice(header);
        der.extend_from_slice(&self.bytes);
        der
    }

    /// Raw SEC1 point bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G_COMPRESSED: &str = "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";
    const G_UNCOMPRESSED: &str = "0479BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798\
483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8";

    #[test]
    fn test_parse_compressed() {
        let record = PublicKeyRecord::parse(G_COMPRESSED, KeyFormat::Compressed).unwrap();
        assert!(record.is_compressed());
        assert_eq!(record.hex(), G_COMPRESSED.to_ascii_lowercase());
    }

    #[test]
    fn test_parse_trims_scanner_whitespace() {
        let scanned = format!("  {}\r\n", G_COMPRESSED);
        let record = PublicKeyRecord::parse(&scanned, KeyFormat::Compressed).unwrap();
        assert_eq!(record.hex().len(), 66);
    }

    #[test]
    fn test_parse_uncompressed() {
        let record = PublicKeyRecord::parse(G_UNCOMPRESSED, KeyFormat::Uncompressed).unwrap();
        assert_eq!(record.format(), KeyFormat::Uncompressed);
        assert_eq!(record.der_bytes().len(), 23 + 65);
    }

    #[test]
    fn test_odd_length_rejected() {
        let result = PublicKeyRecord::parse(&G_COMPRESSED[..65], KeyFormat::Compressed);
        assert!(matches!(result, Err(CertificateError::MalformedKey(_))));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = format!("02{}", "zz".repeat(32));
        let result = PublicKeyRecord::parse(&bad, KeyFormat::Compressed);
        assert!(matches!(result, Err(CertificateError::MalformedKey(_))));
    }

    #[test]
    fn test_format_mismatch_rejected() {
        // A compressed key cannot be declared uncompressed, and vice versa
        assert!(PublicKeyRecord::parse(G_COMPRESSED, KeyFormat::Uncompressed).is_err());
        assert!(PublicKeyRecord::parse(G_UNCOMPRESSED, KeyFormat::Compressed).is_err());
    }

    #[test]
    fn test_wrong_leading_byte_rejected() {
        let bad = format!("04{}", &G_COMPRESSED[2..]);
        let err = PublicKeyRecord::parse(&bad, KeyFormat::Compressed).unwrap_err();
        assert!(err.to_string().contains("02 or 03"));
    }

    #[test]
    fn test_der_bytes_layout() {
        let record = PublicKeyRecord::parse(G_COMPRESSED, KeyFormat::Compressed).unwrap();
        let der = record.der_bytes();
        assert_eq!(der.len(), 23 + 33);
        assert_eq!(&der[..23], hex::decode(COMPRESSED_PUBKEY_PREPEND).unwrap().as_slice());
        assert_eq!(&der[23..], hex::decode(G_COMPRESSED).unwrap().as_slice());
    }

    #[test]
    fn test_header_bytes_match_hex_constants() {
        for format in [KeyFormat::Compressed, KeyFormat::Uncompressed] {
            let decoded = hex::decode(format.der_prepend()).unwrap();
            assert_eq!(decoded.as_slice(), format.der_prepend_bytes());
        }
    }

    #[test]
    fn test_prepend_lengths_match_key_lengths() {
        for format in [KeyFormat::Compressed, KeyFormat::Uncompressed] {
            let header = hex::decode(format.der_prepend()).unwrap();
            // outer SEQUENCE length covers everything after its own two bytes
            assert_eq!(header[1] as usize, header.len() - 2 + format.key_len());
            // BIT STRING length covers the unused-bits byte plus the key
            assert_eq!(header[header.len() - 2] as usize, format.key_len() + 1);
        }
    }
}
