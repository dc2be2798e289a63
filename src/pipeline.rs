//! Extraction orchestrator.
//!
//! One run walks `Init → NativePass → {Done | OcrPass} → Done`:
//!
//! - `Init` acquires and identifies the document. Images, and PDFs when
//!   `extraction.force_ocr` is set, go straight to `OcrPass`.
//! - `NativePass` runs the native extractor on every page in order.
//! - `OcrPass` runs only when no native page came back `ok`, and at most
//!   once per document.
//! - `Done` folds the pages into an [`OverallStatus`].
//!
//! Every transition is a named `tracing` event carrying the run's
//! `extraction_id`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::acquire::{Acquirer, DocumentSource};
use crate::classifier::Classifier;
use crate::config::{AppConfig, ExtractionConfig};
use crate::document::{
    ClassifiedLine, Document, DocumentKind, ExtractionMethod, OverallStatus, PageResult,
    PipelineResult,
};
use crate::error::{BackendSelectionError, ExtractionError};
use crate::extract::{PageText, PdfDocument};
use crate::ocr::{
    OcrBackend, OcrBackendFactory, PageImage, PageRasterizer, PdftoppmRasterizer, image_page,
    text_lines,
};

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    NativePass,
    OcrPass,
    Done,
}

/// The extraction pipeline. Cheap to share behind an [`Arc`]; every run
/// owns its own state.
#[derive(Debug)]
pub struct Pipeline {
    acquirer: Acquirer,
    options: ExtractionConfig,
    classifier: Classifier<'static>,
    rasterizer: Arc<dyn PageRasterizer>,
    backend: Option<Arc<dyn OcrBackend>>,
}

impl Pipeline {
    /// Build with `pdftoppm` and the backend named by `ocr.backend`.
    pub fn from_config(config: &AppConfig) -> Result<Self, BackendSelectionError> {
        let backend = OcrBackendFactory::create(config)?;
        Ok(Self::new(
            config,
            Arc::new(PdftoppmRasterizer::new(&config.ocr)),
            backend,
        ))
    }

    /// Build with explicit OCR collaborators.
    pub fn new(
        config: &AppConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        backend: Option<Arc<dyn OcrBackend>>,
    ) -> Self {
        Self {
            acquirer: Acquirer::new(config.acquisition.clone()),
            options: config.extraction.clone(),
            classifier: Classifier::standard(),
            rasterizer,
            backend,
        }
    }

    pub fn ruleset_version(&self) -> &'static str {
        self.classifier.ruleset_version()
    }

    /// Extract and classify one document. Never panics on bad input; every
    /// failure is folded into the returned result.
    pub fn run(&self, source: &DocumentSource) -> PipelineResult {
        let extraction_id = Uuid::new_v4();
        let span = info_span!("extraction", %extraction_id);
        let _entered = span.enter();
        let started = Instant::now();

        let mut run = Run {
            pipeline: self,
            extraction_id,
            source: source.describe(),
            kind: None,
            page_count: None,
            pages: Vec::new(),
            escalated: false,
            ocr_attempted: false,
        };
        info!(name: "pipeline.start", %extraction_id, source = %run.source, "extraction started");

        let result = run.execute(source);
        info!(
            name: "pipeline.done",
            %extraction_id,
            status = result.status.as_str(),
            pages = result.pages.len(),
            retained = result.retained_lines().count(),
            escalated = result.escalated,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "extraction finished"
        );
        result
    }

    /// Run on the blocking pool. Dropping the returned future does not
    /// cancel the extraction; only a panic surfaces as `JoinError`.
    pub async fn run_async(
        self: &Arc<Self>,
        source: DocumentSource,
    ) -> Result<PipelineResult, tokio::task::JoinError> {
        let pipeline = Arc::clone(self);
        let span = Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| pipeline.run(&source))).await
    }
}

/// State of one extraction.
struct Run<'p> {
    pipeline: &'p Pipeline,
    extraction_id: Uuid,
    source: String,
    kind: Option<DocumentKind>,
    page_count: Option<usize>,
    pages: Vec<PageResult>,
    escalated: bool,
    ocr_attempted: bool,
}

impl Run<'_> {
    fn execute(&mut self, source: &DocumentSource) -> PipelineResult {
        let acquired = match self.pipeline.acquirer.acquire(source) {
            Ok(acquired) => acquired,
            Err(e) => return self.fail(e.into()),
        };
        self.source = acquired.locator.to_string();
        let mut document = match acquired.into_document() {
            Ok(document) => document,
            Err(e) => return self.fail(e.into()),
        };
        self.kind = Some(document.kind);
        self.page_count = document.page_count;

        let mut stage = Stage::Init;
        loop {
            let next = match stage {
                Stage::Init => self.initial_stage(&document),
                Stage::NativePass => match PdfDocument::open(&document.bytes) {
                    Ok(pdf) => {
                        document.page_count = Some(pdf.page_count());
                        self.page_count = document.page_count;
                        self.native_pass(&pdf)
                    }
                    Err(e) => return self.fail(e.into()),
                },
                Stage::OcrPass => self.ocr_pass(&document),
                Stage::Done => break,
            };
            debug!(
                name: "pipeline.transition",
                extraction_id = %self.extraction_id,
                from = ?stage,
                to = ?next,
                "stage change"
            );
            stage = next;
        }
        self.finish()
    }

    fn initial_stage(&self, document: &Document) -> Stage {
        match document.kind {
            // nothing but OCR can read an image; without a backend the OCR pass reports that
            DocumentKind::Image => Stage::OcrPass,
            DocumentKind::Pdf if self.pipeline.options.force_ocr => {
                if self.pipeline.backend.is_some() {
                    Stage::OcrPass
                } else {
                    warn!(
                        name: "pipeline.force_ocr.unavailable",
                        extraction_id = %self.extraction_id,
                        "force_ocr requested but OCR is disabled; using native extraction"
                    );
                    Stage::NativePass
                }
            }
            DocumentKind::Pdf => Stage::NativePass,
        }
    }

    fn page_limit(&self, available: usize) -> usize {
        match self.pipeline.options.max_pages {
            0 => available,
            limit => available.min(limit),
        }
    }

    fn native_pass(&mut self, pdf: &PdfDocument) -> Stage {
        let total = pdf.page_count();
        let count = self.page_limit(total);
        if count < total {
            info!(extraction_id = %self.extraction_id, total, processed = count, "page limit applied");
        }

        for index in 0..count {
            let page = match pdf.extract_page(index) {
                PageText::Lines { lines, attempt } => {
                    debug!(page = index, ?attempt, "native text recovered");
                    PageResult::ok(index, ExtractionMethod::Native, self.classify(lines))
                }
                PageText::NoText => PageResult::no_text(
                    index,
                    ExtractionMethod::Native,
                    "no text layer found on this page",
                ),
                PageText::Error(diagnostic) => {
                    PageResult::error(index, ExtractionMethod::Native, diagnostic)
                }
            };
            info!(
                name: "pipeline.native.page",
                extraction_id = %self.extraction_id,
                page = index,
                status = ?page.status,
                lines = page.lines.len(),
                retained = page.retained_count(),
                "native page done"
            );
            self.pages.push(page);
        }

        if self.pages.iter().any(PageResult::is_ok) {
            return Stage::Done;
        }
        match &self.pipeline.backend {
            Some(backend) => {
                info!(
                    name: "pipeline.escalate",
                    extraction_id = %self.extraction_id,
                    backend = backend.name(),
                    pages = self.pages.len(),
                    "no native text; escalating to OCR"
                );
                self.escalated = true;
                Stage::OcrPass
            }
            None => {
                warn!(
                    name: "pipeline.escalate",
                    extraction_id = %self.extraction_id,
                    backend = "disabled",
                    pages = self.pages.len(),
                    "no native text and OCR is disabled"
                );
                Stage::Done
            }
        }
    }

    fn ocr_pass(&mut self, document: &Document) -> Stage {
        let Some(backend) = self.pipeline.backend.clone() else {
            self.pages = vec![PageResult::no_text(
                0,
                ExtractionMethod::Ocr,
                "image documents need OCR, but the OCR backend is disabled",
            )];
            return Stage::Done;
        };
        self.ocr_attempted = true;

        let images = match document.kind {
            DocumentKind::Image => image_page(&document.bytes).map(|page| vec![page]),
            DocumentKind::Pdf => self
                .pipeline
                .rasterizer
                .rasterize(&document.bytes, self.pipeline.options.max_pages),
        };

        let pages = match images {
            Ok(images) => images
                .iter()
                .map(|image| self.ocr_page(backend.as_ref(), image))
                .collect(),
            Err(e) => {
                warn!(
                    name: "pipeline.ocr.raster_failed",
                    extraction_id = %self.extraction_id,
                    error = %e,
                    "rasterization failed; every page fails"
                );
                let diagnostic = e.to_string();
                (0..self.expected_pages(document))
                    .map(|index| PageResult::error(index, ExtractionMethod::Ocr, diagnostic.clone()))
                    .collect()
            }
        };
        self.pages = pages;
        Stage::Done
    }

    fn ocr_page(&self, backend: &dyn OcrBackend, image: &PageImage) -> PageResult {
        let index = image.page_index;
        let page = match backend.recognize(image) {
            Ok(text) => {
                let lines = text_lines(&text);
                if lines.is_empty() {
                    PageResult::no_text(
                        index,
                        ExtractionMethod::Ocr,
                        format!("{} recognised no text on this page", backend.name()),
                    )
                } else {
                    PageResult::ok(index, ExtractionMethod::Ocr, self.classify(lines))
                }
            }
            Err(e) => PageResult::error(index, ExtractionMethod::Ocr, e.to_string()),
        };
        info!(
            name: "pipeline.ocr.page",
            extraction_id = %self.extraction_id,
            page = index,
            backend = backend.name(),
            status = ?page.status,
            lines = page.lines.len(),
            retained = page.retained_count(),
            notice = page.notice.as_deref().unwrap_or(""),
            "ocr page done"
        );
        page
    }

    /// Page count to report when rasterization fails outright.
    fn expected_pages(&self, document: &Document) -> usize {
        let total = document.page_count.unwrap_or_else(|| {
            PdfDocument::open(&document.bytes).map_or(1, |pdf| pdf.page_count())
        });
        self.page_limit(total).max(1)
    }

    fn classify(&self, lines: Vec<String>) -> Vec<ClassifiedLine> {
        lines
            .into_iter()
            .map(|line| self.pipeline.classifier.classify_line(line))
            .collect()
    }

    fn finish(&mut self) -> PipelineResult {
        let retained: usize = self.pages.iter().map(PageResult::retained_count).sum();
        let ok_pages: Vec<&PageResult> = self.pages.iter().filter(|p| p.is_ok()).collect();

        let (status, failure) = if retained > 0 {
            (OverallStatus::Success, None)
        } else if !ok_pages.is_empty() {
            (
                OverallStatus::EmptyAfterFilter,
                Some(ExtractionError::EmptyAfterFilter {
                    pages_with_text: ok_pages.len(),
                    lines: ok_pages.iter().map(|p| p.lines.len()).sum(),
                    ruleset: self.pipeline.ruleset_version(),
                }),
            )
        } else {
            (
                OverallStatus::NoExtractableText,
                Some(ExtractionError::NoText {
                    pages: self.pages.len(),
                    ocr_attempted: self.ocr_attempted,
                }),
            )
        };
        self.result(status, failure)
    }

    fn fail(&mut self, error: ExtractionError) -> PipelineResult {
        warn!(
            name: "pipeline.failed",
            extraction_id = %self.extraction_id,
            error = %error,
            "extraction failed"
        );
        self.result(OverallStatus::Error, Some(error))
    }

    fn result(&mut self, status: OverallStatus, failure: Option<ExtractionError>) -> PipelineResult {
        PipelineResult {
            extraction_id: self.extraction_id,
            status,
            source: self.source.clone(),
            kind: self.kind,
            page_count: self.page_count,
            pages: std::mem::take(&mut self.pages),
            escalated: self.escalated,
            ruleset_version: self.pipeline.ruleset_version(),
            failure,
        }
    }
}
