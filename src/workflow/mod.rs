//! Signing and verification workflows

mod operator;
mod sign;
mod verify;

pub use operator::{Operator, TerminalOperator};
pub use sign::{
    SignError, SignRequest, SignSettings, SigningCoordinator, SigningOutcome,
    DEFAULT_MAX_CAPTURE_ATTEMPTS,
};
pub use verify::{
    verify, InputRole, Secp256k1Verifier, SignatureVerifier, Verdict, VerificationCoordinator,
    VerificationRequest, VerificationResult, VerifyError,
};

/// Broad failure families, each with its own process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or unreadable file, bad configuration or arguments
    Input,
    /// Malformed key, undecodable signature text, QR render failure
    Encoding,
    /// The verification library could not run (e.g. corrupt certificate)
    Engine,
    /// Capture timed out or its source went away
    Capture,
    /// Operator cancelled a capture
    Cancelled,
}

impl ErrorClass {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClass::Input => 2,
            ErrorClass::Encoding => 3,
            ErrorClass::Engine => 4,
            ErrorClass::Capture => 5,
            ErrorClass::Cancelled => crate::signal::EXIT_CODE_CANCELLED,
        }
    }
}
