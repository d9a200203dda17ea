//! What the signing coordinator shows to the human running it

use std::path::Path;

use crate::qr::{RenderedQr, ScanKind};

/// Presentation surface for the signing workflow (terminal, GUI, test recorder)
pub trait Operator {
    /// Explain how to sign on the device before the hash QR is shown
    fn instruct_signing(&mut self, file: &Path);

    /// Present the hash QR for the device to scan
    fn show_qr(&mut self, qr: &RenderedQr);

    /// Ask for the device's `kind` QR code to be scanned
    fn request_scan(&mut self, kind: ScanKind, attempt: u32, max_attempts: u32);

    /// Tell the operator about a step outcome or a recoverable problem
    fn report(&mut self, message: &str);
}

/// Operator surface on stdout
#[derive(Debug, Clone)]
pub struct TerminalOperator {
    invert_qr: bool,
}

impl TerminalOperator {
    pub fn new(invert_qr: bool) -> Self {
        Self { invert_qr }
    }
}

impl Operator for TerminalOperator {
    fn instruct_signing(&mut self, file: &Path) {
        println!();
        println!("To sign {} with your signing device:", file.display());
        println!(" (a) load a 12/24 words key, with or without passphrase;");
        println!(" (b) use the Sign -> Message feature;");
        println!(" (c) and scan this QR code below.");
        println!();
    }

    fn show_qr(&mut self, qr: &RenderedQr) {
        println!("{}", qr.to_terminal(self.invert_qr));
        println!("{}", qr.payload());
        println!();
    }

    fn request_scan(&mut self, kind: ScanKind, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            println!("Retrying ({}/{}).", attempt, max_attempts);
        }
        println!(
            "Scan the {} QR code shown on the device (type 'q' and Enter to cancel):",
            kind
        );
    }

    fn report(&mut self, message: &str) {
        println!("{}", message);
    }
}
