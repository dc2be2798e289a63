//! Factory for creating OCR backends based on configuration.

use std::str::FromStr;
use std::sync::Arc;

use super::mistral::MistralBackend;
use super::tesseract::TesseractBackend;
use super::vision::VisionBackend;
use super::OcrBackend;
use crate::config::AppConfig;
use crate::error::BackendSelectionError;

/// Value of `ocr.backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Auto,
    Tesseract,
    Vision,
    Mistral,
    Disabled,
}

impl FromStr for BackendChoice {
    type Err = BackendSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "tesseract" => Ok(Self::Tesseract),
            "vision" | "openai" => Ok(Self::Vision),
            "mistral" => Ok(Self::Mistral),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(BackendSelectionError::Unknown(other.to_string())),
        }
    }
}

/// Factory for creating OCR backends based on configuration.
#[derive(Debug)]
pub struct OcrBackendFactory;

impl OcrBackendFactory {
    /// Create the configured backend; `None` means OCR is disabled.
    ///
    /// # Backend Selection
    ///
    /// For "auto" mode, returns the first usable backend in order:
    /// 1. Vision model (if an API key is configured)
    /// 2. Mistral OCR (if an API key is configured)
    /// 3. Tesseract (local, always selectable)
    pub fn create(
        config: &AppConfig,
    ) -> Result<Option<Arc<dyn OcrBackend>>, BackendSelectionError> {
        let timeout = config.ocr.timeout_secs;
        let backend: Arc<dyn OcrBackend> = match config.ocr.backend.parse::<BackendChoice>()? {
            BackendChoice::Disabled => {
                tracing::info!("OCR fallback disabled");
                return Ok(None);
            }
            BackendChoice::Tesseract => Arc::new(TesseractBackend::new(&config.ocr)),
            BackendChoice::Vision => Arc::new(VisionBackend::new(config.vision.clone(), timeout)),
            BackendChoice::Mistral => {
                let backend = MistralBackend::new(config.mistral.clone(), timeout);
                if !backend.is_configured() {
                    return Err(BackendSelectionError::MissingKey("mistral"));
                }
                Arc::new(backend)
            }
            BackendChoice::Auto => {
                let vision = VisionBackend::new(config.vision.clone(), timeout);
                let mistral = MistralBackend::new(config.mistral.clone(), timeout);
                if vision.is_configured() {
                    Arc::new(vision)
                } else if mistral.is_configured() {
                    Arc::new(mistral)
                } else {
                    Arc::new(TesseractBackend::new(&config.ocr))
                }
            }
        };
        tracing::info!(backend = backend.name(), "using OCR backend");
        Ok(Some(backend))
    }
}
