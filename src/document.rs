//! Data model shared by the pipeline stages.
//!
//! Values here are produced once and never mutated afterwards: the
//! orchestrator builds [`PageResult`]s as it goes and hands the caller a
//! finished [`PipelineResult`].

use serde::{Serialize, Serializer};

use crate::classifier::Verdict;
use crate::error::ExtractionError;

/// Where the document bytes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocator {
    /// Base64 payload supplied by the caller.
    Inline { filename: Option<String> },
    /// Local filesystem path.
    Local { path: String },
    /// Downloaded over http(s).
    Remote { url: String },
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline {
                filename: Some(name),
            } => write!(f, "inline:{name}"),
            Self::Inline { filename: None } => f.write_str("inline"),
            Self::Local { path } => write!(f, "file:{path}"),
            Self::Remote { url } => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Image,
}

/// A document held in memory for one pipeline run.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub locator: SourceLocator,
    pub kind: DocumentKind,
    /// Known once the PDF has been opened.
    pub page_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Native,
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Ocr => "ocr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Raw lines were recovered (the retained set may still be empty).
    Ok,
    /// Nothing usable was recovered.
    NoText,
    /// The page could not be processed.
    Error,
}

/// A line together with the classifier's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedLine {
    pub text: String,
    pub normalized: String,
    pub verdict: Verdict,
}

/// Outcome for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// 0-based page index.
    pub index: usize,
    pub method: ExtractionMethod,
    pub status: PageStatus,
    /// Every raw line, classified. Empty unless `status` is `Ok`.
    pub lines: Vec<ClassifiedLine>,
    /// Diagnostic for non-`Ok` pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl PageResult {
    pub fn ok(index: usize, method: ExtractionMethod, lines: Vec<ClassifiedLine>) -> Self {
        debug_assert!(!lines.is_empty(), "an ok page carries raw lines");
        Self {
            index,
            method,
            status: PageStatus::Ok,
            lines,
            notice: None,
        }
    }

    pub fn no_text(index: usize, method: ExtractionMethod, notice: impl Into<String>) -> Self {
        Self {
            index,
            method,
            status: PageStatus::NoText,
            lines: Vec::new(),
            notice: Some(notice.into()),
        }
    }

    pub fn error(index: usize, method: ExtractionMethod, notice: impl Into<String>) -> Self {
        Self {
            index,
            method,
            status: PageStatus::Error,
            lines: Vec::new(),
            notice: Some(notice.into()),
        }
    }

    /// Lines the classifier kept, in page order.
    pub fn retained(&self) -> impl Iterator<Item = &ClassifiedLine> {
        self.lines.iter().filter(|line| line.verdict.is_keep())
    }

    pub fn retained_count(&self) -> usize {
        self.retained().count()
    }

    pub fn is_ok(&self) -> bool {
        self.status == PageStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Success,
    EmptyAfterFilter,
    NoExtractableText,
    Error,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::EmptyAfterFilter => "empty_after_filter",
            Self::NoExtractableText => "no_extractable_text",
            Self::Error => "error",
        }
    }
}

/// Final result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub extraction_id: uuid::Uuid,
    pub status: OverallStatus,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DocumentKind>,
    /// Pages in the document, which can exceed `pages.len()` under a page limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    pub pages: Vec<PageResult>,
    /// OCR ran after the native pass came up empty.
    pub escalated: bool,
    pub ruleset_version: &'static str,
    #[serde(
        serialize_with = "serialize_failure",
        skip_serializing_if = "Option::is_none"
    )]
    pub failure: Option<ExtractionError>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == OverallStatus::Success
    }

    pub fn error(&self) -> Option<&ExtractionError> {
        self.failure.as_ref()
    }

    pub fn retained_lines(&self) -> impl Iterator<Item = &ClassifiedLine> {
        self.pages.iter().flat_map(PageResult::retained)
    }
}

fn serialize_failure<S: Serializer>(
    failure: &Option<ExtractionError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(err) => serializer.collect_str(err),
        None => serializer.serialize_none(),
    }
}
