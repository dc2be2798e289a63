//! `pdftoppm` (poppler) page rendering.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use super::{PageImage, PageRasterizer, run_with_timeout};
use crate::config::OcrConfig;
use crate::error::OcrBackendError;

/// Renders pages into a temporary directory that is removed on return.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
    dpi: u32,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.pdftoppm_binary.clone(),
            dpi: config.dpi,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &[u8], max_pages: usize) -> Result<Vec<PageImage>, OcrBackendError> {
        let workdir = tempfile::Builder::new()
            .prefix("statement-ocr-")
            .tempdir()
            .map_err(|e| OcrBackendError::Raster(format!("cannot create work dir: {e}")))?;
        let input = workdir.path().join("input.pdf");
        std::fs::write(&input, pdf)
            .map_err(|e| OcrBackendError::Raster(format!("cannot write work file: {e}")))?;

        let mut command = Command::new(&self.binary);
        command.arg("-png").arg("-r").arg(self.dpi.to_string());
        if max_pages > 0 {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(&input).arg(workdir.path().join("page"));

        let output = run_with_timeout(command, self.timeout, "pdftoppm").map_err(|e| match e {
            OcrBackendError::Raster(_) => e,
            other => OcrBackendError::Raster(other.to_string()),
        })?;
        if !output.status.success() {
            return Err(OcrBackendError::Raster(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut rendered: Vec<(usize, std::path::PathBuf)> = std::fs::read_dir(workdir.path())
            .map_err(|e| OcrBackendError::Raster(e.to_string()))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        rendered.sort_by_key(|(n, _)| *n);
        if rendered.is_empty() {
            return Err(OcrBackendError::Raster("pdftoppm produced no images".to_string()));
        }

        let pages = rendered
            .into_iter()
            .map(|(number, path)| {
                let png = std::fs::read(&path)
                    .map_err(|e| OcrBackendError::Raster(format!("{}: {e}", path.display())))?;
                let (width, height) = image::image_dimensions(&path)
                    .map_err(|e| OcrBackendError::Raster(format!("{}: {e}", path.display())))?;
                Ok(PageImage {
                    page_index: number.saturating_sub(1),
                    png,
                    width,
                    height,
                })
            })
            .collect::<Result<Vec<_>, OcrBackendError>>()?;

        debug!(name: "ocr.raster", pages = pages.len(), dpi = self.dpi, "rendered pages");
        Ok(pages)
    }
}

/// 1-based page number from pdftoppm's `page-N.png` / `page-0N.png` names.
fn page_number(path: &Path) -> Option<usize> {
    if path.extension().is_none_or(|ext| ext != "png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}
