//! Document acquisition.
//!
//! Resolves a [`DocumentSource`] (inline base64, local path or http(s) URL)
//! into bytes. Downloads are spooled through a [`tempfile::NamedTempFile`]
//! owned by the [`AcquiredDocument`], so the file disappears with it.

mod download;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::AcquisitionConfig;
use crate::document::{Document, DocumentKind, SourceLocator};
use crate::error::{AcquisitionError, ParseError};

/// Standard alphabet, padding optional.
const INLINE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How the caller hands over the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Inline {
        /// Base64 payload; whitespace and a `data:` URL prefix are tolerated.
        content: String,
        filename: Option<String>,
        content_type: Option<String>,
    },
    FileReference {
        /// Local path, or an `http://` / `https://` URL.
        file_path: String,
    },
}

/// Caller supplied neither or both input forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SourceArgsError {
    #[error("provide either `file_path` or `content`, not both")]
    Both,
    #[error("provide one of `file_path` or `content`")]
    Neither,
}

impl DocumentSource {
    /// Build a source from the optional fields of a tool call or CLI.
    pub fn from_parts(
        file_path: Option<String>,
        content: Option<String>,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> Result<Self, SourceArgsError> {
        let file_path = file_path.filter(|s| !s.trim().is_empty());
        let content = content.filter(|s| !s.trim().is_empty());
        match (file_path, content) {
            (Some(_), Some(_)) => Err(SourceArgsError::Both),
            (None, None) => Err(SourceArgsError::Neither),
            (Some(file_path), None) => Ok(Self::FileReference { file_path }),
            (None, Some(content)) => Ok(Self::Inline {
                content,
                filename,
                content_type,
            }),
        }
    }

    pub fn inline(content: impl Into<String>, filename: Option<&str>) -> Self {
        Self::Inline {
            content: content.into(),
            filename: filename.map(str::to_string),
            content_type: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::FileReference {
            file_path: path.into(),
        }
    }

    /// Short description for logs and reports; never includes inline bytes.
    pub fn describe(&self) -> String {
        match self {
            Self::Inline { filename, .. } => SourceLocator::Inline {
                filename: filename.clone(),
            }
            .to_string(),
            Self::FileReference { file_path } => file_path.clone(),
        }
    }
}

/// Bytes plus whatever the source said about them.
#[derive(Debug)]
pub struct AcquiredDocument {
    pub bytes: Vec<u8>,
    pub locator: SourceLocator,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    spool: Option<NamedTempFile>,
}

impl AcquiredDocument {
    /// Path of the download spool file, while it exists.
    pub fn spool_path(&self) -> Option<&Path> {
        self.spool.as_ref().map(NamedTempFile::path)
    }

    /// Detect the kind and hand the bytes over as a [`Document`].
    ///
    /// The spool file, if any, is removed here; the bytes are already in
    /// memory.
    pub fn into_document(self) -> Result<Document, ParseError> {
        let kind = detect_kind(
            &self.bytes,
            self.filename.as_deref(),
            self.content_type.as_deref(),
        )?;
        Ok(Document {
            bytes: self.bytes,
            locator: self.locator,
            kind,
            page_count: (kind == DocumentKind::Image).then_some(1),
        })
    }
}

/// Resolves sources according to [`AcquisitionConfig`].
#[derive(Debug, Clone)]
pub struct Acquirer {
    config: AcquisitionConfig,
}

impl Acquirer {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    pub fn acquire(&self, source: &DocumentSource) -> Result<AcquiredDocument, AcquisitionError> {
        match source {
            DocumentSource::Inline {
                content,
                filename,
                content_type,
            } => {
                let bytes = decode_inline_within(content, self.config.max_bytes)?;
                debug!(name: "acquire.inline", bytes = bytes.len(), "decoded inline document");
                Ok(AcquiredDocument {
                    bytes,
                    locator: SourceLocator::Inline {
                        filename: filename.clone(),
                    },
                    filename: filename.clone(),
                    content_type: content_type.clone(),
                    spool: None,
                })
            }
            DocumentSource::FileReference { file_path } => {
                let trimmed = file_path.trim();
                if is_remote(trimmed) {
                    download::fetch(&self.config, trimmed)
                } else {
                    self.read_local(Path::new(trimmed))
                }
            }
        }
    }

    fn read_local(&self, path: &Path) -> Result<AcquiredDocument, AcquisitionError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AcquisitionError::NotFound(path.to_path_buf()),
            _ => AcquisitionError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        if !metadata.is_file() {
            return Err(AcquisitionError::Read {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        self.check_size(metadata.len())?;

        let bytes = std::fs::read(path).map_err(|e| AcquisitionError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(AcquisitionError::Empty);
        }
        debug!(name: "acquire.local", path = %path.display(), bytes = bytes.len(), "read local document");

        Ok(AcquiredDocument {
            bytes,
            locator: SourceLocator::Local {
                path: path.display().to_string(),
            },
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            content_type: None,
            spool: None,
        })
    }

    fn check_size(&self, len: u64) -> Result<(), AcquisitionError> {
        if len > self.config.max_bytes {
            Err(AcquisitionError::TooLarge {
                limit: self.config.max_bytes,
            })
        } else {
            Ok(())
        }
    }
}

fn is_remote(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decode an inline payload, tolerating whitespace and a `data:` URL prefix.
pub fn decode_inline(content: &str) -> Result<Vec<u8>, AcquisitionError> {
    decode_inline_within(content, u64::MAX)
}

/// Like [`decode_inline`], but refuses payloads that would decode to more
/// than `max_bytes` before allocating the decoded buffer.
pub fn decode_inline_within(content: &str, max_bytes: u64) -> Result<Vec<u8>, AcquisitionError> {
    let payload = match content.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AcquisitionError::Decode("data URL without payload".to_string()))?,
        None => content,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(AcquisitionError::Empty);
    }
    let decoded_len = compact.trim_end_matches('=').len() as u64 * 3 / 4;
    if decoded_len > max_bytes {
        return Err(AcquisitionError::TooLarge { limit: max_bytes });
    }
    let bytes = INLINE_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| AcquisitionError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AcquisitionError::Empty);
    }
    Ok(bytes)
}

/// Decide between PDF and image, by content first and declared type second.
pub fn detect_kind(
    bytes: &[u8],
    filename: Option<&str>,
    content_type: Option<&str>,
) -> Result<DocumentKind, ParseError> {
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        return Ok(DocumentKind::Pdf);
    }
    if image::guess_format(bytes).is_ok() {
        return Ok(DocumentKind::Image);
    }

    let declared = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| {
            filename
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        });

    match declared.as_deref() {
        Some("application/pdf") => Ok(DocumentKind::Pdf),
        Some(mime) if mime.starts_with("image/") => Ok(DocumentKind::Image),
        Some(mime) => Err(ParseError::Unsupported(mime.to_string())),
        None => Err(ParseError::Unsupported("unknown".to_string())),
    }
}

/// Create a spool file under `dir`, or the system temp dir.
fn spool_file(dir: Option<&PathBuf>) -> Result<NamedTempFile, AcquisitionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("statement-").suffix(".download");
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| AcquisitionError::Spool(e.to_string()))
}
