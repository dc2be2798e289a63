//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::{Engine, engine::general_purpose::STANDARD};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use statement_extract::AppConfig;
use statement_extract::DocumentSource;
use statement_extract::Pipeline;
use statement_extract::error::OcrBackendError;
use statement_extract::ocr::{OcrBackend, PageImage, PageRasterizer};

/// A PDF with one page per entry and one text line per string.
/// An empty entry is a page without a text layer.
pub fn statement_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            let y = 750 - 20 * i64::try_from(i).unwrap();
            operations.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 40.into(), y.into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));
        let stream = Content { operations }.encode().unwrap();

        let content_id = doc.add_object(Stream::new(dictionary! {}, stream));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A small blank PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    image::DynamicImage::new_luma8(width, height)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

pub fn inline(bytes: &[u8], filename: &str) -> DocumentSource {
    DocumentSource::inline(STANDARD.encode(bytes), Some(filename))
}

/// OCR backend answering from a script keyed by page index.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pages: HashMap<usize, Result<String, OcrBackendError>>,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, index: usize, text: &str) -> Self {
        self.pages.insert(index, Ok(text.to_string()));
        self
    }

    pub fn failing(mut self, index: usize, error: OcrBackendError) -> Self {
        self.pages.insert(index, Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, image: &PageImage) -> Result<String, OcrBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&image.page_index)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Rasterizer producing `pages` blank images without touching `pdftoppm`.
#[derive(Debug)]
pub struct FakeRasterizer {
    pub pages: usize,
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &[u8], max_pages: usize) -> Result<Vec<PageImage>, OcrBackendError> {
        let count = if max_pages == 0 {
            self.pages
        } else {
            self.pages.min(max_pages)
        };
        Ok((0..count)
            .map(|page_index| PageImage {
                page_index,
                png: png(4, 4),
                width: 4,
                height: 4,
            })
            .collect())
    }
}

pub fn pipeline_with(
    config: &AppConfig,
    raster_pages: usize,
    backend: Option<Arc<ScriptedBackend>>,
) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(FakeRasterizer {
            pages: raster_pages,
        }),
        backend.map(|b| b as Arc<dyn OcrBackend>),
    )
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
