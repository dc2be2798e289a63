//! Local Tesseract engine.

use std::io::Write;
use std::process::Command;
use std::time::Duration;

use super::{OcrBackend, PageImage, run_with_timeout};
use crate::config::OcrConfig;
use crate::error::OcrBackendError;

const NAME: &str = "tesseract";

/// Runs `tesseract <page.png> stdout -l <lang>` for each page.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractBackend {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_binary.clone(),
            language: config.tesseract_language.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognize(&self, image: &PageImage) -> Result<String, OcrBackendError> {
        let mut input = tempfile::Builder::new()
            .prefix("statement-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrBackendError::Backend {
                backend: NAME,
                diagnostic: format!("cannot create page file: {e}"),
            })?;
        input
            .write_all(&image.png)
            .and_then(|()| input.flush())
            .map_err(|e| OcrBackendError::Backend {
                backend: NAME,
                diagnostic: format!("cannot write page file: {e}"),
            })?;

        let mut command = Command::new(&self.binary);
        command
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            // psm 4: a single column of variable-size text, which keeps table rows together
            .arg("--psm")
            .arg("4");

        let output = run_with_timeout(command, self.timeout, NAME)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if stderr.contains("Failed loading language") {
                OcrBackendError::Unavailable {
                    backend: NAME,
                    reason: format!("language data '{}' is not installed", self.language),
                }
            } else {
                OcrBackendError::Backend {
                    backend: NAME,
                    diagnostic: format!("exit {}: {stderr}", output.status),
                }
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        let backend = TesseractBackend::new(&OcrConfig {
            tesseract_binary: "statement-extract-no-such-tesseract".to_string(),
            ..OcrConfig::default()
        });
        let page = PageImage {
            page_index: 0,
            png: vec![0x89, b'P', b'N', b'G'],
            width: 1,
            height: 1,
        };
        assert!(matches!(
            backend.recognize(&page),
            Err(OcrBackendError::Unavailable { backend: "tesseract", .. })
        ));
    }
}
