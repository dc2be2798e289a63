//! Rendering of a [`PipelineResult`] for callers.
//!
//! The text report is what the tool boundary hands back to an agent and what
//! the CLI prints by default:
//!
//! ```text
//! status: success | ruleset: 2025.3 | source: inline:extrato.pdf
//! --- PAGE 1 ---
//! method: native
//! 12/03/2024  PIX RECEBIDO  R$ 150,00
//! ```

use std::fmt;

use crate::document::{PageResult, PageStatus, PipelineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Page-by-page plain text.
    #[default]
    Text,
    /// The whole result as JSON.
    Json,
}

/// Render the plain-text report.
pub fn render(result: &PipelineResult) -> String {
    Report(result).to_string()
}

/// Render the result as pretty-printed JSON.
pub fn render_json(result: &PipelineResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

pub fn render_as(result: &PipelineResult, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render(result)),
        OutputFormat::Json => render_json(result),
    }
}

struct Report<'a>(&'a PipelineResult);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        writeln!(
            f,
            "status: {} | ruleset: {} | source: {}",
            result.status.as_str(),
            result.ruleset_version,
            result.source
        )?;
        if let Some(failure) = result.error() {
            writeln!(f, "{failure}")?;
            for page in result.pages.iter().filter(|p| p.notice.is_some()) {
                if let Some(notice) = &page.notice {
                    writeln!(f, "  page {}: {notice}", page.index + 1)?;
                }
            }
        }
        if result.escalated {
            writeln!(f, "note: no native text was found; pages were read with OCR")?;
        }
        for page in &result.pages {
            write_page(f, page)?;
        }
        Ok(())
    }
}

fn write_page(f: &mut fmt::Formatter<'_>, page: &PageResult) -> fmt::Result {
    writeln!(f, "--- PAGE {} ---", page.index + 1)?;
    writeln!(f, "method: {}", page.method.as_str())?;
    let notice = page.notice.as_deref().unwrap_or("");
    match page.status {
        PageStatus::Error => writeln!(f, "[error] {notice}"),
        PageStatus::NoText => writeln!(f, "[no text] {notice}"),
        PageStatus::Ok if page.retained_count() == 0 => writeln!(
            f,
            "[no lines retained] {} line(s) recovered, none look transactional",
            page.lines.len()
        ),
        PageStatus::Ok => {
            for line in page.retained() {
                writeln!(f, "{}", line.text)?;
            }
            Ok(())
        }
    }
}
