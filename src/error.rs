//! Error taxonomy for the extraction pipeline.
//!
//! Every expected failure mode is a typed error that the pipeline folds into
//! a [`crate::document::PipelineResult`]; nothing here is meant to escape the
//! tool boundary as a panic or an `anyhow` chain.

use std::path::PathBuf;

/// Failure to obtain the document bytes. No extraction is attempted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AcquisitionError {
    /// The inline payload is not valid base64.
    #[error("inline content is not valid base64: {0}")]
    Decode(String),

    /// The inline payload or downloaded body was empty.
    #[error("document is empty")]
    Empty,

    /// A local path does not exist or cannot be read.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A local file exists but reading it failed.
    #[error("failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    /// The URL could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Download failed (connection, TLS, non-2xx status).
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Body is larger than `acquisition.max_bytes`.
    #[error("document exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// Temporary spool file could not be created or written.
    #[error("temporary file error: {0}")]
    Spool(String),
}

/// The document could not be opened at all.
///
/// Corruption and image-only documents often look the same to the native
/// parser, so the message points the caller at the OCR path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("PDF is corrupted or unreadable ({0}); retry with OCR (force_ocr) if it is a scan")]
    Corrupt(String),

    #[error("PDF is encrypted; retry with OCR (force_ocr) or supply an unlocked copy")]
    Encrypted,

    #[error("PDF appears to be empty or corrupted (no pages); retry with OCR (force_ocr)")]
    NoPages,

    #[error("unsupported document type '{0}': expected a PDF or an image")]
    Unsupported(String),
}

/// A recognition backend failed for one page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OcrBackendError {
    /// Backend binary or credentials are missing.
    #[error("{backend} is unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    /// Remote API rejected the credentials (401/403).
    #[error("{backend} authentication failed ({status}): {body}")]
    Auth {
        backend: &'static str,
        status: u16,
        body: String,
    },

    /// Remote API rate limit or quota exhausted (429).
    #[error("{backend} quota exceeded: {body}")]
    Quota { backend: &'static str, body: String },

    /// Request exceeded `ocr.timeout_secs`.
    #[error("{backend} timed out after {secs}s")]
    Timeout { backend: &'static str, secs: u64 },

    /// Transport failure or unexpected HTTP status.
    #[error("{backend} request failed: {reason}")]
    Http {
        backend: &'static str,
        reason: String,
    },

    /// Local engine exited unsuccessfully.
    #[error("{backend} failed: {diagnostic}")]
    Backend {
        backend: &'static str,
        diagnostic: String,
    },

    /// Response could not be understood.
    #[error("{backend} returned an invalid response: {reason}")]
    InvalidResponse {
        backend: &'static str,
        reason: String,
    },

    /// Page could not be rasterized, so the backend was never called.
    #[error("page rasterization failed: {0}")]
    Raster(String),
}

/// Document-level outcome errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("could not obtain the document: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("could not parse the document: {0}")]
    Parse(#[from] ParseError),

    /// The document opened but neither pass produced any text.
    #[error(
        "no extractable text found in {pages} page(s); the document looks image-only or corrupted{}",
        ocr_note(.ocr_attempted)
    )]
    NoText { pages: usize, ocr_attempted: bool },

    /// Text was recovered but the classifier kept none of it.
    #[error(
        "text was extracted from {pages_with_text} page(s) ({lines} line(s)) but no line was recognised as a transaction or header (ruleset {ruleset})"
    )]
    EmptyAfterFilter {
        pages_with_text: usize,
        lines: usize,
        ruleset: &'static str,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn ocr_note(ocr_attempted: &bool) -> &'static str {
    if *ocr_attempted {
        " and OCR recovered nothing"
    } else {
        " and OCR was not available"
    }
}

/// The configured OCR backend cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendSelectionError {
    #[error("unknown OCR backend '{0}': expected auto, tesseract, vision, mistral or disabled")]
    Unknown(String),

    #[error("OCR backend '{0}' requires an API key")]
    MissingKey(&'static str),
}
