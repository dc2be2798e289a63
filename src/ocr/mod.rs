//! OCR fallback.
//!
//! Pages are turned into images by a [`PageRasterizer`] and read back by an
//! [`OcrBackend`]. Both are traits so deployments pick an engine through
//! configuration ([`OcrBackendFactory`]) and tests can script them.
//!
//! Backends are synchronous: the pipeline runs on a blocking thread, and
//! remote backends build their HTTP client per call there.

mod factory;
mod mistral;
mod raster;
mod tesseract;
mod vision;

pub use factory::{BackendChoice, OcrBackendFactory};
pub use mistral::MistralBackend;
pub use raster::PdftoppmRasterizer;
pub use tesseract::TesseractBackend;
pub use vision::VisionBackend;

use std::io::{Cursor, Read};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use image::ImageFormat;

use crate::error::OcrBackendError;

/// One rasterized page, PNG-encoded.
#[derive(Clone)]
pub struct PageImage {
    /// 0-based page index within the document.
    pub page_index: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_index", &self.page_index)
            .field("png_bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Turns one page image into text.
///
/// Implementations must preserve line breaks; the classifier works line by
/// line. Failures are per page and never abort the document.
pub trait OcrBackend: Send + Sync + std::fmt::Debug {
    /// Short name for logs and page notices.
    fn name(&self) -> &'static str;

    fn recognize(&self, image: &PageImage) -> Result<String, OcrBackendError>;
}

/// Renders PDF pages to images.
pub trait PageRasterizer: Send + Sync + std::fmt::Debug {
    /// Render up to `max_pages` pages (0 = all), in page order.
    fn rasterize(&self, pdf: &[u8], max_pages: usize) -> Result<Vec<PageImage>, OcrBackendError>;
}

/// Normalise an image document to a single PNG page.
pub fn image_page(bytes: &[u8]) -> Result<PageImage, OcrBackendError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| OcrBackendError::Raster(format!("image cannot be decoded: {e}")))?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| OcrBackendError::Raster(format!("image cannot be re-encoded: {e}")))?;
    Ok(PageImage {
        page_index: 0,
        png,
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Split recognised text into trimmed, non-empty lines.
pub fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map a non-success HTTP status from a remote backend.
pub(crate) fn status_error(backend: &'static str, status: u16, body: String) -> OcrBackendError {
    match status {
        401 | 403 => OcrBackendError::Auth {
            backend,
            status,
            body,
        },
        429 => OcrBackendError::Quota { backend, body },
        _ => OcrBackendError::Http {
            backend,
            reason: format!("HTTP {status}: {body}"),
        },
    }
}

/// Map a transport failure from a remote backend.
pub(crate) fn transport_error(
    backend: &'static str,
    timeout_secs: u64,
    err: &reqwest::Error,
) -> OcrBackendError {
    if err.is_timeout() {
        OcrBackendError::Timeout {
            backend,
            secs: timeout_secs,
        }
    } else {
        OcrBackendError::Http {
            backend,
            reason: err.to_string(),
        }
    }
}

/// Keep error bodies short enough for a page notice.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    let body = body.trim();
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

/// Run an external engine, killing it once `timeout` elapses.
pub(crate) fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
    backend: &'static str,
) -> Result<Output, OcrBackendError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OcrBackendError::Unavailable {
                backend,
                reason: format!("`{program}` not found on PATH"),
            },
            _ => OcrBackendError::Backend {
                backend,
                diagnostic: format!("cannot start `{program}`: {e}"),
            },
        })?;

    // drain the pipes concurrently so a chatty engine cannot block on a full pipe
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrBackendError::Timeout {
                    backend,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            Err(e) => {
                return Err(OcrBackendError::Backend {
                    backend,
                    diagnostic: e.to_string(),
                });
            }
        }
    };

    let collect = |handle: Option<std::thread::JoinHandle<Vec<u8>>>| {
        handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    };
    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}
