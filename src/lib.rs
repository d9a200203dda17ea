//! ksigner - air-gapped file signing over QR codes
//!
//! A file's SHA-256 digest is shown as a QR code to an offline secp256k1
//! signing device. The device's signature and public key come back as QR
//! codes, are persisted next to the file together with a PEM certificate,
//! and can later be verified as a (file, signature, certificate) triple.

pub mod artifact;
pub mod config;
pub mod hash;
pub mod logging;
pub mod qr;
pub mod signal;
pub mod state;
pub mod workflow;

pub use config::{ConfigError, EffectiveConfig, KsignerConfig};
pub use hash::{hash_file, FileDigest, HashError};
pub use ksigner_cert::{build_certificate, CertificateError, KeyFormat, PublicKeyCertificate};
pub use state::SigningState;
pub use workflow::{
    verify, ErrorClass, SignError, SignRequest, SignSettings, SigningCoordinator,
    VerificationCoordinator, VerificationRequest, VerificationResult, VerifyError,
};
