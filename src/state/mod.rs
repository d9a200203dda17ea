//! Signing workflow state machine
//!
//! Idle → Hashed → HashDisplayed → SignatureCaptured → PublicKeyCaptured
//! → CertificateWritten. Strictly forward; the only way back is a restart.

mod signing_state;

pub use signing_state::{SigningState, SigningStateError};

/// Check if a state is terminal (no further transitions possible)
pub trait TerminalState {
    fn is_terminal(&self) -> bool;
}
