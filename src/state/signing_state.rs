//! Signing states and their allowed transitions

use super::TerminalState;

/// Where a signing run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SigningState {
    /// No file hashed yet
    Idle,
    /// Digest computed and `.sha256sum.txt` written
    Hashed,
    /// Digest shown as a QR code for the device
    HashDisplayed,
    /// Signature scanned and `.sig` written
    SignatureCaptured,
    /// Public key hex scanned
    PublicKeyCaptured,
    /// `.pem` written
    CertificateWritten,
}

impl TerminalState for SigningState {
    fn is_terminal(&self) -> bool {
        matches!(self, SigningState::CertificateWritten)
    }
}

impl SigningState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: SigningState) -> bool {
        self.next() == Some(target)
    }

    /// The single state that may follow this one
    pub fn next(&self) -> Option<SigningState> {
        match self {
            SigningState::Idle => Some(SigningState::Hashed),
            SigningState::Hashed => Some(SigningState::HashDisplayed),
            SigningState::HashDisplayed => Some(SigningState::SignatureCaptured),
            SigningState::SignatureCaptured => Some(SigningState::PublicKeyCaptured),
            SigningState::PublicKeyCaptured => Some(SigningState::CertificateWritten),
            SigningState::CertificateWritten => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SigningState::Idle => "idle",
            SigningState::Hashed => "hashed",
            SigningState::HashDisplayed => "hash displayed",
            SigningState::SignatureCaptured => "signature captured",
            SigningState::PublicKeyCaptured => "public key captured",
            SigningState::CertificateWritten => "certificate written",
        }
    }
}

impl std::fmt::Display for SigningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors for signing state operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SigningStateError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SigningState,
        to: SigningState,
    },

    #[error("Signing run already finished ({0})")]
    Finished(SigningState),
}

impl SigningStateError {
    /// Error for an attempted `from → to` step
    pub fn for_step(from: SigningState, to: SigningState) -> Self {
        if from.is_terminal() {
            SigningStateError::Finished(from)
        } else {
            SigningStateError::InvalidTransition { from, to }
        }
    }
}
