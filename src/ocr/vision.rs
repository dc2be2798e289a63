//! OpenAI-compatible vision model as an OCR backend.
//!
//! Sends each page as a base64 `image_url` part of a chat completion and asks
//! for a verbatim, line-preserving transcription. Works against OpenAI, Azure
//! OpenAI deployments and any server speaking the same protocol.

use std::io::Cursor;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::ImageFormat;
use image::imageops::FilterType;
use serde_json::{Value, json};
use tracing::debug;

use super::{OcrBackend, PageImage, status_error, transport_error, truncate_body};
use crate::config::{VisionConfig, non_empty};
use crate::error::OcrBackendError;

const NAME: &str = "vision";

const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

const SYSTEM_PROMPT: &str = "You transcribe scanned financial statements. \
Return the text of the page exactly as printed, one printed line per output line, \
keeping dates, descriptions and amounts on the same line. \
Do not summarise, translate, reformat numbers or add commentary.";

/// Where chat completions are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    OpenAi,
    Azure {
        deployment: String,
        api_version: String,
    },
}

#[derive(Debug, Clone)]
pub struct VisionBackend {
    config: VisionConfig,
    endpoint: Endpoint,
    timeout_secs: u64,
}

impl VisionBackend {
    pub fn new(config: VisionConfig, timeout_secs: u64) -> Self {
        let endpoint = Self::detect_endpoint(&config);
        Self {
            config,
            endpoint,
            timeout_secs,
        }
    }

    /// A key is what makes the hosted default usable.
    pub fn is_configured(&self) -> bool {
        non_empty(self.config.api_key.as_deref()).is_some()
    }

    fn detect_endpoint(config: &VisionConfig) -> Endpoint {
        let azure_host = config.base_url.to_lowercase().contains("azure.com");
        match non_empty(config.azure_deployment.as_deref()) {
            Some(deployment) => Endpoint::Azure {
                deployment: deployment.to_string(),
                api_version: Self::api_version(config),
            },
            None if azure_host => Endpoint::Azure {
                deployment: config.model.clone(),
                api_version: Self::api_version(config),
            },
            None => Endpoint::OpenAi,
        }
    }

    fn api_version(config: &VisionConfig) -> String {
        non_empty(config.azure_api_version.as_deref())
            .unwrap_or(DEFAULT_AZURE_API_VERSION)
            .to_string()
    }

    fn chat_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match &self.endpoint {
            Endpoint::Azure {
                deployment,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            ),
            Endpoint::OpenAi if base.ends_with("/v1") => format!("{base}/chat/completions"),
            Endpoint::OpenAi => format!("{base}/v1/chat/completions"),
        }
    }

    /// Downscale so the longest edge fits `max_image_dimension`.
    fn prepare_png(&self, image: &PageImage) -> Result<Vec<u8>, OcrBackendError> {
        let limit = self.config.max_image_dimension;
        if limit == 0 || image.width.max(image.height) <= limit {
            return Ok(image.png.clone());
        }
        let decoded = image::load_from_memory(&image.png).map_err(|e| OcrBackendError::Backend {
            backend: NAME,
            diagnostic: format!("page image cannot be decoded: {e}"),
        })?;
        let resized = decoded.resize(limit, limit, FilterType::Triangle);
        let mut png = Vec::new();
        resized
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrBackendError::Backend {
                backend: NAME,
                diagnostic: format!("page image cannot be re-encoded: {e}"),
            })?;
        debug!(
            page = image.page_index,
            from = image.width.max(image.height),
            to = limit,
            "downscaled page for upload"
        );
        Ok(png)
    }

    fn request_body(&self, png: &[u8]) -> Value {
        json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "Transcribe this statement page." },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/png;base64,{}", STANDARD.encode(png)),
                                "detail": "high"
                            }
                        }
                    ]
                }
            ]
        })
    }
}

impl OcrBackend for VisionBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognize(&self, image: &PageImage) -> Result<String, OcrBackendError> {
        let png = self.prepare_png(image)?;
        let body = self.request_body(&png);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| transport_error(NAME, self.timeout_secs, &e))?;
        let mut request = client.post(self.chat_url()).json(&body);
        if let Some(key) = non_empty(self.config.api_key.as_deref()) {
            request = match self.endpoint {
                Endpoint::Azure { .. } => request.header("api-key", key),
                Endpoint::OpenAi => request.bearer_auth(key),
            };
        }

        let response = request
            .send()
            .map_err(|e| transport_error(NAME, self.timeout_secs, &e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(status_error(NAME, status.as_u16(), truncate_body(&text)));
        }

        let payload: Value = response
            .json()
            .map_err(|e| OcrBackendError::InvalidResponse {
                backend: NAME,
                reason: e.to_string(),
            })?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| OcrBackendError::InvalidResponse {
                backend: NAME,
                reason: "missing choices[0].message.content".to_string(),
            })?;
        Ok(strip_code_fence(content).to_string())
    }
}

/// Models sometimes wrap the transcription in a Markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
