//! End-to-end signing runs against a software stand-in for the device.
//!
//! The "device" is a fixed k256 key: it signs the file the way the hardware
//! does (ECDSA over the SHA-256 digest, DER output) and exports its public
//! key as hex. Scans are replayed through `ScriptedCapture`.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use ksigner::qr::{RenderedQr, ScanKind, ScriptedCapture};
use ksigner::workflow::{
    verify, ErrorClass, Operator, SignError, SignRequest, SignSettings, SigningCoordinator,
};
use ksigner::{KeyFormat, SigningState};
use tempfile::TempDir;

struct Device {
    key: SigningKey,
}

impl Device {
    fn new() -> Self {
        Self {
            key: SigningKey::from_bytes((&[7u8; 32]).into()).unwrap(),
        }
    }

    fn signature_qr(&self, data: &[u8]) -> String {
        let sig: Signature = self.key.sign(data);
        base64::engine::general_purpose::STANDARD.encode(sig.to_der().as_bytes())
    }

    fn pubkey_qr(&self, format: KeyFormat) -> String {
        let point = self
            .key
            .verifying_key()
            .to_encoded_point(format == KeyFormat::Compressed);
        hex::encode(point.as_bytes())
    }
}

#[derive(Default)]
struct Quiet {
    shown: Vec<String>,
}

impl Operator for Quiet {
    fn instruct_signing(&mut self, _file: &Path) {}

    fn show_qr(&mut self, qr: &RenderedQr) {
        self.shown.push(qr.payload().to_string());
    }

    fn request_scan(&mut self, _kind: ScanKind, _attempt: u32, _max_attempts: u32) {}

    fn report(&mut self, _message: &str) {}
}

fn write_doc(dir: &TempDir, content: &[u8]) -> PathBuf {
    let file = dir.path().join("doc.txt");
    fs::write(&file, content).unwrap();
    file
}

fn signer(
    file: &Path,
    owner: &str,
    format: KeyFormat,
    capture: ScriptedCapture,
) -> SigningCoordinator<ScriptedCapture, Quiet> {
    let request = SignRequest {
        file: file.to_path_buf(),
        owner: owner.to_string(),
        format,
    };
    SigningCoordinator::new(request, SignSettings::default(), capture, Quiet::default()).unwrap()
}

#[test]
fn test_compressed_run_verifies() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"hello krux\n");
    let device = Device::new();

    let capture = ScriptedCapture::new()
        .then_decode(device.signature_qr(b"hello krux\n"))
        .then_decode(device.pubkey_qr(KeyFormat::Compressed));
    let mut coordinator = signer(&file, "alice", KeyFormat::Compressed, capture);

    let outcome = coordinator.run().unwrap();
    assert_eq!(coordinator.state(), SigningState::CertificateWritten);
    assert_eq!(
        coordinator.operator().shown,
        vec!["cdc6dcb997218ba01f2c41028d57cd790598b95c8c00b3772f7f26bbbdb2acfc".to_string()]
    );

    assert_eq!(outcome.digest_path, dir.path().join("doc.txt.sha256sum.txt"));
    assert_eq!(outcome.signature_path, dir.path().join("doc.txt.sig"));
    assert_eq!(outcome.certificate_path, dir.path().join("alice.pem"));

    let sidecar = fs::read_to_string(&outcome.digest_path).unwrap();
    assert!(sidecar.starts_with("cdc6dcb997218ba01f2c41028d57cd790598b95c8c00b3772f7f26bbbdb2acfc "));

    let result = verify(&file, &outcome.certificate_path, &outcome.signature_path).unwrap();
    assert!(result.ok, "{}", result.detail);
}

#[test]
fn test_uncompressed_run_verifies() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"");
    let device = Device::new();

    let capture = ScriptedCapture::new()
        .then_decode(device.signature_qr(b""))
        .then_decode(device.pubkey_qr(KeyFormat::Uncompressed));
    let mut coordinator = signer(&file, "pubkey", KeyFormat::Uncompressed, capture);

    let outcome = coordinator.run().unwrap();
    assert_eq!(
        outcome.digest.hex_digest(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );

    let pem = fs::read_to_string(&outcome.certificate_path).unwrap();
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\nMFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAE"));

    assert!(verify(&file, &outcome.certificate_path, &outcome.signature_path)
        .unwrap()
        .ok);
}

#[test]
fn test_signature_file_holds_decoded_bytes() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"payload");
    let device = Device::new();
    let scanned = device.signature_qr(b"payload");

    let capture = ScriptedCapture::new()
        .then_decode(format!("  {}\n", scanned))
        .then_decode(device.pubkey_qr(KeyFormat::Compressed));
    let outcome = signer(&file, "pubkey", KeyFormat::Compressed, capture)
        .run()
        .unwrap();

    let raw = fs::read(&outcome.signature_path).unwrap();
    assert_eq!(
        raw,
        base64::engine::general_purpose::STANDARD
            .decode(scanned)
            .unwrap()
    );
}

#[test]
fn test_format_mismatch_writes_no_pem() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"payload");
    let device = Device::new();

    // compressed key scanned while expecting uncompressed
    let capture = ScriptedCapture::new()
        .then_decode(device.signature_qr(b"payload"))
        .then_decode(device.pubkey_qr(KeyFormat::Compressed));
    let mut coordinator = signer(&file, "pubkey", KeyFormat::Uncompressed, capture);

    let err = coordinator.run().unwrap_err();
    assert_eq!(err.class(), ErrorClass::Encoding);
    assert_eq!(coordinator.state(), SigningState::PublicKeyCaptured);
    assert!(dir.path().join("doc.txt.sig").exists());
    assert!(!dir.path().join("pubkey.pem").exists());
}

#[test]
fn test_cancel_then_resume() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"release notes");
    let device = Device::new();

    let capture = ScriptedCapture::new().then_cancel();
    let mut first = signer(&file, "pubkey", KeyFormat::Compressed, capture);
    let err = first.run().unwrap_err();
    assert!(matches!(err, SignError::Capture(_)));
    assert_eq!(err.class().exit_code(), 80);
    assert_eq!(first.state(), SigningState::HashDisplayed);
    assert!(dir.path().join("doc.txt.sha256sum.txt").exists());
    assert!(!dir.path().join("doc.txt.sig").exists());

    let capture = ScriptedCapture::new()
        .then_decode(device.signature_qr(b"release notes"))
        .then_decode(device.pubkey_qr(KeyFormat::Compressed));
    let mut second = signer(&file, "pubkey", KeyFormat::Compressed, capture);
    assert_eq!(second.resume().unwrap(), SigningState::Hashed);

    let outcome = second.run().unwrap();
    assert_eq!(outcome.resumed_from, SigningState::Hashed);
    assert!(verify(&file, &outcome.certificate_path, &outcome.signature_path)
        .unwrap()
        .ok);
}

#[test]
fn test_rerun_overwrites_artifacts() {
    let dir = TempDir::new().unwrap();
    let file = write_doc(&dir, b"v1");
    let device = Device::new();

    for _ in 0..2 {
        let capture = ScriptedCapture::new()
            .then_decode(device.signature_qr(b"v1"))
            .then_decode(device.pubkey_qr(KeyFormat::Compressed));
        signer(&file, "pubkey", KeyFormat::Compressed, capture)
            .run()
            .unwrap();
    }

    let pems: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "pem"))
        .collect();
    assert_eq!(pems.len(), 1);
}
