//! Signing coordinator
//!
//! Drives one file through the air gap:
//! 1. hash the file and write `<file>.sha256sum.txt`
//! 2. show the digest as a QR code for the device to sign
//! 3. scan the signature QR, decode base64, write `<file>.sig`
//! 4. scan the public key QR
//! 5. build the PEM certificate and write `<owner>.pem`
//!
//! Each step persists its artifact before the state advances. A failed step
//! leaves the coordinator where it was; only capture steps are retried.

use std::fs;
use std::path::{Path, PathBuf};

use ksigner_cert::{validate_owner, CertificateError, KeyFormat, PublicKeyRecord};
use thiserror::Error;

use super::{ErrorClass, Operator};
use crate::artifact::{
    certificate_dir, digest_path, discard_signature, persist_certificate, signature_path,
    write_atomic, ArtifactError, InvalidSignatureEncoding, SignatureArtifact,
};
use crate::hash::{self, FileDigest, HashError};
use crate::qr::{self, CaptureError, QrCapture, RenderError, ScanKind};
use crate::state::{SigningState, SigningStateError};

/// Default number of tries per capture step
pub const DEFAULT_MAX_CAPTURE_ATTEMPTS: u32 = 3;

/// What to sign and how to name the certificate
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// File to sign
    pub file: PathBuf,
    /// Certificate owner, written as `<owner>.pem` next to the file
    pub owner: String,
    /// Point format the device exports the public key in
    pub format: KeyFormat,
}

/// Knobs for a signing run
#[derive(Debug, Clone)]
pub struct SignSettings {
    /// Tries per capture step before giving up (at least 1)
    pub max_capture_attempts: u32,
    /// Also save the hash QR as an SVG file
    pub qr_svg: Option<PathBuf>,
}

impl Default for SignSettings {
    fn default() -> Self {
        Self {
            max_capture_attempts: DEFAULT_MAX_CAPTURE_ATTEMPTS,
            qr_svg: None,
        }
    }
}

/// Errors from the signing workflow
#[derive(Debug, Error)]
pub enum SignError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    SignatureEncoding(#[from] InvalidSignatureEncoding),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    State(#[from] SigningStateError),

    #[error("Giving up on the {kind} scan after {attempts} attempts: {last}")]
    AttemptsExhausted {
        kind: ScanKind,
        attempts: u32,
        last: Box<SignError>,
    },
}

impl SignError {
    /// Which family of failure this is
    pub fn class(&self) -> ErrorClass {
        match self {
            SignError::Hash(_) | SignError::Artifact(_) | SignError::State(_) => ErrorClass::Input,
            SignError::Certificate(CertificateError::InvalidOwner { .. }) => ErrorClass::Input,
            SignError::Render(_) | SignError::SignatureEncoding(_) | SignError::Certificate(_) => {
                ErrorClass::Encoding
            }
            SignError::Capture(CaptureError::Cancelled(_)) => ErrorClass::Cancelled,
            SignError::Capture(_) => ErrorClass::Capture,
            SignError::AttemptsExhausted { last, .. } => last.class(),
        }
    }

    /// A fresh capture might fix this
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SignError::SignatureEncoding(_) | SignError::Capture(CaptureError::TimedOut { .. })
        )
    }
}

/// Artifacts of a finished signing run
#[derive(Debug, Clone)]
pub struct SigningOutcome {
    pub digest: FileDigest,
    pub digest_path: PathBuf,
    pub signature_path: PathBuf,
    pub certificate_path: PathBuf,
    /// State the run picked up from (`Idle` unless resumed)
    pub resumed_from: SigningState,
}

#[derive(Debug, Clone)]
struct Captured {
    digest: FileDigest,
    signature: SignatureArtifact,
}

/// Workflow state with the data each state has earned
#[derive(Debug)]
enum Stage {
    Idle,
    Hashed(FileDigest),
    HashDisplayed(FileDigest),
    SignatureCaptured(Captured),
    PublicKeyCaptured(Captured, String),
    CertificateWritten(Captured, PathBuf),
}

impl Stage {
    fn state(&self) -> SigningState {
        match self {
            Stage::Idle => SigningState::Idle,
            Stage::Hashed(_) => SigningState::Hashed,
            Stage::HashDisplayed(_) => SigningState::HashDisplayed,
            Stage::SignatureCaptured(_) => SigningState::SignatureCaptured,
            Stage::PublicKeyCaptured(..) => SigningState::PublicKeyCaptured,
            Stage::CertificateWritten(..) => SigningState::CertificateWritten,
        }
    }

    fn digest(&self) -> Option<&FileDigest> {
        match self {
            Stage::Idle => None,
            Stage::Hashed(digest) | Stage::HashDisplayed(digest) => Some(digest),
            Stage::SignatureCaptured(captured)
            | Stage::PublicKeyCaptured(captured, _)
            | Stage::CertificateWritten(captured, _) => Some(&captured.digest),
        }
    }
}

/// Single-run signing state machine
pub struct SigningCoordinator<C, O> {
    request: SignRequest,
    settings: SignSettings,
    capture: C,
    operator: O,
    stage: Stage,
    resumed_from: SigningState,
}

impl<C: QrCapture, O: Operator> SigningCoordinator<C, O> {
    /// Create a coordinator in `Idle`. The owner is validated up front so a
    /// bad name cannot surface only after both scans.
    pub fn new(
        request: SignRequest,
        settings: SignSettings,
        capture: C,
        operator: O,
    ) -> Result<Self, SignError> {
        validate_owner(&request.owner)?;
        Ok(Self {
            request,
            settings,
            capture,
            operator,
            stage: Stage::Idle,
            resumed_from: SigningState::Idle,
        })
    }

    pub fn state(&self) -> SigningState {
        self.stage.state()
    }

    pub fn request(&self) -> &SignRequest {
        &self.request
    }

    /// Digest of the file, once hashed
    pub fn digest(&self) -> Option<&FileDigest> {
        self.stage.digest()
    }

    pub fn capture_backend(&self) -> &C {
        &self.capture
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    fn step_error(&self, target: SigningState) -> SignError {
        SigningStateError::for_step(self.state(), target).into()
    }

    /// Fail unless `target` is the next state
    fn begin_step(&self, target: SigningState) -> Result<(), SignError> {
        if self.state().can_transition_to(target) {
            Ok(())
        } else {
            Err(self.step_error(target))
        }
    }

    /// Idle → Hashed: hash the file and persist the digest sidecar.
    ///
    /// A `.sig` from an earlier run is removed so it can never be paired
    /// with the new sidecar.
    pub fn hash(&mut self) -> Result<FileDigest, SignError> {
        self.begin_step(SigningState::Hashed)?;

        let digest = hash::hash_file(&self.request.file)?;
        discard_signature(&self.request.file)?;
        let path = hash::persist_digest(&digest)?;
        self.operator
            .report(&format!("{} content: {}", path.display(), digest.sidecar_line()));

        self.stage = Stage::Hashed(digest.clone());
        tracing::info!(state = %self.state(), file = %self.request.file.display(), "file hashed");
        Ok(digest)
    }

    /// Hashed → HashDisplayed: render the digest and show it to the device.
    pub fn display_hash(&mut self) -> Result<(), SignError> {
        self.begin_step(SigningState::HashDisplayed)?;
        let digest = match &self.stage {
            Stage::Hashed(digest) => digest.clone(),
            _ => return Err(self.step_error(SigningState::HashDisplayed)),
        };

        let rendered = qr::render(digest.hex_digest())?;
        if let Some(svg_path) = &self.settings.qr_svg {
            write_atomic(svg_path, rendered.to_svg().as_bytes())?;
            tracing::info!(path = %svg_path.display(), "hash QR code saved");
        }
        self.operator.show_qr(&rendered);

        self.stage = Stage::HashDisplayed(digest);
        tracing::info!(state = %self.state(), "hash displayed");
        Ok(())
    }

    /// HashDisplayed → SignatureCaptured: one capture attempt.
    ///
    /// On a capture failure or bad base64 the state is unchanged and nothing
    /// is written, so the capture can simply be tried again.
    pub fn capture_signature(&mut self) -> Result<PathBuf, SignError> {
        self.begin_step(SigningState::SignatureCaptured)?;
        let digest = match &self.stage {
            Stage::HashDisplayed(digest) => digest.clone(),
            _ => return Err(self.step_error(SigningState::SignatureCaptured)),
        };

        let scanned = self.capture.capture(ScanKind::Signature)?;
        let signature = SignatureArtifact::from_scanned(&self.request.file, &scanned)?;
        let path = signature.persist()?;
        self.operator
            .report(&format!("Signature saved on {}", path.display()));

        self.stage = Stage::SignatureCaptured(Captured { digest, signature });
        tracing::info!(state = %self.state(), "signature captured");
        Ok(path)
    }

    /// SignatureCaptured → PublicKeyCaptured: one capture attempt.
    pub fn capture_public_key(&mut self) -> Result<(), SignError> {
        self.begin_step(SigningState::PublicKeyCaptured)?;
        let captured = match &self.stage {
            Stage::SignatureCaptured(captured) => captured.clone(),
            _ => return Err(self.step_error(SigningState::PublicKeyCaptured)),
        };

        let scanned = self.capture.capture(ScanKind::PublicKey)?;
        let hex_pubkey = scanned.trim().to_string();
        tracing::debug!(pubkey = %hex_pubkey, "public key scanned");

        self.stage = Stage::PublicKeyCaptured(captured, hex_pubkey);
        tracing::info!(state = %self.state(), "public key captured");
        Ok(())
    }

    /// PublicKeyCaptured → CertificateWritten: build and persist `<owner>.pem`.
    ///
    /// A malformed key halts the run here; no certificate file is written.
    pub fn write_certificate(&mut self) -> Result<PathBuf, SignError> {
        self.begin_step(SigningState::CertificateWritten)?;
        let (captured, hex_pubkey) = match &self.stage {
            Stage::PublicKeyCaptured(captured, hex) => (captured.clone(), hex.clone()),
            _ => return Err(self.step_error(SigningState::CertificateWritten)),
        };

        let record = PublicKeyRecord::parse(&hex_pubkey, self.request.format)?;
        let certificate = record.to_certificate(&self.request.owner)?;
        let path = persist_certificate(&certificate, &certificate_dir(&self.request.file))?;
        self.operator.report(&format!("{} saved", path.display()));

        self.stage = Stage::CertificateWritten(captured, path.clone());
        tracing::info!(state = %self.state(), path = %path.display(), "certificate written");
        Ok(path)
    }

    /// Pick up from artifacts a previous run left behind.
    ///
    /// The file is re-hashed. A matching digest sidecar skips hashing, and a
    /// signature at least as new as that sidecar also skips the signature
    /// scan. Anything stale starts the run over from a fresh digest, and any
    /// old `.sig` is removed with it.
    ///
    /// Every sidecar this coordinator writes removes the previous `.sig`, so
    /// a signature beside a matching sidecar was captured against it. The
    /// file-time check only guards sidecars written elsewhere (`ksigner
    /// hash`), and with coarse timestamps it cannot tell a same-tick
    /// signature from an older one.
    pub fn resume(&mut self) -> Result<SigningState, SignError> {
        self.begin_step(SigningState::Hashed)?;

        let file = self.request.file.clone();
        let digest = hash::hash_file(&file)?;

        let digest_matches = match hash::read_digest_file(&file) {
            Ok(line) => line.hex_digest == digest.hex_digest(),
            Err(e) => {
                tracing::debug!(error = %e, "no usable digest sidecar");
                false
            }
        };

        if !digest_matches {
            tracing::info!(file = %file.display(), "nothing to resume, starting fresh");
            discard_signature(&file)?;
            hash::persist_digest(&digest)?;
            self.stage = Stage::Hashed(digest);
            return Ok(self.state());
        }

        let sig_path = signature_path(&file);
        if sig_path.exists() && !is_older(&sig_path, &digest_path(&file)) {
            let signature = SignatureArtifact::load(&file)?;
            self.operator
                .report(&format!("Reusing signature {}", sig_path.display()));
            self.stage = Stage::SignatureCaptured(Captured { digest, signature });
        } else {
            self.stage = Stage::Hashed(digest);
        }

        self.resumed_from = self.state();
        tracing::info!(state = %self.state(), file = %file.display(), "resumed");
        Ok(self.state())
    }

    /// Run every remaining step, retrying captures as configured.
    pub fn run(&mut self) -> Result<SigningOutcome, SignError> {
        if self.state() == SigningState::Idle {
            self.hash()?;
        }
        if self.state() == SigningState::Hashed {
            self.operator.instruct_signing(&self.request.file);
            self.display_hash()?;
        }
        if self.state() == SigningState::HashDisplayed {
            self.with_retries(ScanKind::Signature, Self::capture_signature)?;
        }
        if self.state() == SigningState::SignatureCaptured {
            self.with_retries(ScanKind::PublicKey, Self::capture_public_key)?;
        }
        if self.state() == SigningState::PublicKeyCaptured {
            self.write_certificate()?;
        }
        self.outcome()
    }

    fn with_retries<T>(
        &mut self,
        kind: ScanKind,
        mut step: impl FnMut(&mut Self) -> Result<T, SignError>,
    ) -> Result<T, SignError> {
        let max_attempts = self.settings.max_capture_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.operator.request_scan(kind, attempt, max_attempts);
            match step(self) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(kind = %kind, attempt, error = %e, "scan failed, retrying");
                    self.operator.report(&e.to_string());
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(SignError::AttemptsExhausted {
                        kind,
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Summary of a finished run
    pub fn outcome(&self) -> Result<SigningOutcome, SignError> {
        match &self.stage {
            Stage::CertificateWritten(captured, certificate_path) => Ok(SigningOutcome {
                digest: captured.digest.clone(),
                digest_path: captured.digest.sidecar_path(),
                signature_path: captured.signature.path(),
                certificate_path: certificate_path.clone(),
                resumed_from: self.resumed_from,
            }),
            _ => Err(self.step_error(SigningState::CertificateWritten)),
        }
    }
}

/// `a` was modified strictly before `b`. Unknown times count as older.
fn is_older(a: &Path, b: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(a), modified(b)) {
        (Some(a), Some(b)) => a < b,
        _ => true,
    }
}
