//! QR bridge between the desktop and the offline signing device
//!
//! Two directions cross the air gap:
//! - render: a text payload becomes a QR code the device can scan
//! - capture: a QR code shown by the device becomes text for the workflow
//!
//! Capture is the one long-blocking, operator-paced call in the system.
//! Backends implement [`QrCapture`]; a failed or cancelled capture is always
//! recoverable and never touches persisted artifacts.

mod line;
mod scripted;

pub use line::{spawn_line_reader, stdin_lines, LineCapture, CANCEL_INPUTS};
pub use scripted::ScriptedCapture;

use qrcode::render::{svg, unicode};
use qrcode::types::QrError;
use qrcode::QrCode;
use thiserror::Error;

/// What the operator is being asked to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Signature,
    PublicKey,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Signature => "signature",
            ScanKind::PublicKey => "public key",
        }
    }
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from rendering a payload
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Payload of {len} bytes does not fit in a QR code")]
    PayloadTooLarge { len: usize },

    #[error("QR encoding failed: {0}")]
    Encoding(String),
}

/// Errors from capturing a QR code. All of them leave the workflow where it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Scan of {0} cancelled by operator")]
    Cancelled(ScanKind),

    #[error("No {kind} QR code decoded within {seconds} seconds")]
    TimedOut { kind: ScanKind, seconds: u64 },

    #[error("Capture source closed before a {0} QR code was decoded")]
    SourceClosed(ScanKind),
}

/// A capture backend: camera, keyboard-wedge scanner, replay queue.
pub trait QrCapture {
    /// Block until a QR code is decoded and return its text, or fail.
    fn capture(&mut self, kind: ScanKind) -> Result<String, CaptureError>;
}

impl<T: QrCapture + ?Sized> QrCapture for Box<T> {
    fn capture(&mut self, kind: ScanKind) -> Result<String, CaptureError> {
        (**self).capture(kind)
    }
}

/// An encoded QR code ready to be shown to the device
pub struct RenderedQr {
    payload: String,
    code: QrCode,
}

impl std::fmt::Debug for RenderedQr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedQr")
            .field("payload", &self.payload)
            .field("width", &self.code.width())
            .finish()
    }
}

impl RenderedQr {
    /// The encoded text
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Modules per side
    pub fn width(&self) -> usize {
        self.code.width()
    }

    /// Unicode half-block rendering for a terminal.
    ///
    /// `invert` draws light modules on a dark background, which is what most
    /// dark terminal themes need for the device camera to lock on.
    pub fn to_terminal(&self, invert: bool) -> String {
        let mut renderer = self.code.render::<unicode::Dense1x2>();
        if invert {
            renderer
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark);
        }
        renderer.quiet_zone(true).build()
    }

    /// Standalone SVG document.
    pub fn to_svg(&self) -> String {
        self.code
            .render::<svg::Color>()
            .min_dimensions(256, 256)
            .build()
    }
}

/// Encode `text` as a QR code.
pub fn render(text: &str) -> Result<RenderedQr, RenderError> {
    let code = QrCode::new(text.as_bytes()).map_err(|e| match e {
        QrError::DataTooLong => RenderError::PayloadTooLarge { len: text.len() },
        other => RenderError::Encoding(other.to_string()),
    })?;
    tracing::debug!(payload = %text, width = code.width(), "QR code rendered");

    Ok(RenderedQr {
        payload: text.to_string(),
        code,
    })
}
