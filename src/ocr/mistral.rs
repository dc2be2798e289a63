//! Mistral OCR backend.
//!
//! Uses Mistral's document AI endpoint (`/v1/ocr`) one page image at a time
//! and flattens the returned Markdown back into plain lines.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;

use super::{OcrBackend, PageImage, status_error, transport_error, truncate_body};
use crate::config::{MistralConfig, non_empty};
use crate::error::OcrBackendError;

const NAME: &str = "mistral";

/// Page-image OCR through the Mistral API.
#[derive(Debug, Clone)]
pub struct MistralBackend {
    config: MistralConfig,
    timeout_secs: u64,
}

impl MistralBackend {
    /// Create a new Mistral OCR backend with the given configuration.
    pub fn new(config: MistralConfig, timeout_secs: u64) -> Self {
        Self {
            config,
            timeout_secs,
        }
    }

    /// Check if the backend is properly configured for use.
    pub fn is_configured(&self) -> bool {
        non_empty(self.config.api_key.as_deref()).is_some()
    }

    fn ocr_url(&self) -> String {
        format!("{}/v1/ocr", self.config.base_url.trim_end_matches('/'))
    }
}

impl OcrBackend for MistralBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognize(&self, image: &PageImage) -> Result<String, OcrBackendError> {
        let api_key =
            non_empty(self.config.api_key.as_deref()).ok_or_else(|| OcrBackendError::Unavailable {
                backend: NAME,
                reason: "Mistral API key not configured".to_string(),
            })?;

        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(&image.png));
        let body = serde_json::json!({
            "model": self.config.model,
            "document": {
                "type": "image_url",
                "image_url": data_url
            }
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| transport_error(NAME, self.timeout_secs, &e))?;
        let response = client
            .post(self.ocr_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| transport_error(NAME, self.timeout_secs, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(status_error(NAME, status.as_u16(), truncate_body(&error_text)));
        }

        let result: Value = response
            .json()
            .map_err(|e| OcrBackendError::InvalidResponse {
                backend: NAME,
                reason: e.to_string(),
            })?;

        // Extract markdown content from response
        let pages = result
            .get("pages")
            .and_then(Value::as_array)
            .ok_or_else(|| OcrBackendError::InvalidResponse {
                backend: NAME,
                reason: "missing `pages` array".to_string(),
            })?;
        let markdown = pages
            .iter()
            .filter_map(|page| page.get("markdown").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(flatten_markdown(&markdown))
    }
}

/// Turn Mistral's Markdown into plain statement lines.
///
/// Table rows become one line with cells separated by two spaces; table
/// rules, image references and heading markers are dropped.
fn flatten_markdown(markdown: &str) -> String {
    markdown
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.starts_with("![") {
                return None;
            }
            if line.starts_with('|') {
                let cells: Vec<&str> = line
                    .trim_matches('|')
                    .split('|')
                    .map(str::trim)
                    .filter(|cell| !cell.is_empty())
                    .collect();
                let is_rule = cells
                    .iter()
                    .all(|cell| cell.chars().all(|c| matches!(c, '-' | ':')));
                return (!is_rule).then(|| cells.join("  "));
            }
            Some(line.trim_start_matches('#').trim().replace("**", ""))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
