//! Native text recovery from PDF pages.
//!
//! Each page gets up to three attempts, cheapest-to-trust first:
//!
//! 1. layout with [`Tolerance::STRICT`], rejected when empty or fragmented;
//! 2. layout with [`Tolerance::LOOSE`], rejected when empty;
//! 3. lopdf's own extractor, which understands font encodings but not
//!    positions.
//!
//! Only when all three come back empty is the page reported as
//! [`PageText::NoText`].

use lopdf::ObjectId;
use tracing::{debug, trace};

use super::content::page_text_runs;
use super::layout::{Tolerance, assemble_lines, is_fragmented};
use crate::error::ParseError;

/// Which attempt produced a page's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    StrictLayout,
    LooseLayout,
    StreamOrder,
}

/// Native outcome for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    Lines { lines: Vec<String>, attempt: Attempt },
    NoText,
    Error(String),
}

/// A parsed PDF, ready for per-page extraction.
#[derive(Debug)]
pub struct PdfDocument {
    doc: lopdf::Document,
    /// 1-based page numbers and their objects, in page order.
    pages: Vec<(u32, ObjectId)>,
}

impl PdfDocument {
    pub fn open(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut doc = lopdf::Document::load_mem(bytes).map_err(|e| {
            let message = e.to_string();
            let lower = message.to_lowercase();
            if lower.contains("encrypt") || lower.contains("password") {
                ParseError::Encrypted
            } else {
                ParseError::Corrupt(message)
            }
        })?;

        if doc.is_encrypted() {
            // statements are often owner-locked with an empty user password
            doc.decrypt("").map_err(|e| {
                debug!(name: "extract.decrypt", error = %e, "empty-password decryption failed");
                ParseError::Encrypted
            })?;
        }

        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        if pages.is_empty() {
            return Err(ParseError::NoPages);
        }
        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Run the attempt ladder for the 0-based page `index`.
    pub fn extract_page(&self, index: usize) -> PageText {
        let Some(&(number, page_id)) = self.pages.get(index) else {
            return PageText::Error(format!("page {index} does not exist"));
        };

        let runs = match page_text_runs(&self.doc, page_id) {
            Ok(runs) => runs,
            Err(e) => return PageText::Error(e.to_string()),
        };

        let strict = assemble_lines(&runs, Tolerance::STRICT);
        if !strict.is_empty() && !is_fragmented(&strict) {
            return PageText::Lines {
                lines: strict,
                attempt: Attempt::StrictLayout,
            };
        }
        trace!(page = index, runs = runs.len(), "strict layout rejected");

        let loose = assemble_lines(&runs, Tolerance::LOOSE);
        if !loose.is_empty() {
            return PageText::Lines {
                lines: loose,
                attempt: Attempt::LooseLayout,
            };
        }
        trace!(page = index, "loose layout empty");

        match self.doc.extract_text(&[number]) {
            Ok(text) => {
                let lines: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                if lines.is_empty() {
                    PageText::NoText
                } else {
                    PageText::Lines {
                        lines,
                        attempt: Attempt::StreamOrder,
                    }
                }
            }
            Err(e) => {
                debug!(page = index, error = %e, "stream-order extraction failed");
                PageText::NoText
            }
        }
    }
}
