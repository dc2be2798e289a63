//! Bank-statement transaction extraction.
//!
//! Takes a statement as a PDF or a scanned image, recovers its text page by
//! page and keeps only the lines that look like transactions.
//!
//! # Architecture
//!
//! - **Acquisition**: inline base64, local files or http(s) downloads
//! - **Native extraction**: text layer via `lopdf` with a graduated retry ladder
//! - **OCR**: pluggable backends (Tesseract, OpenAI-compatible vision, Mistral)
//!   used when the native pass finds nothing
//! - **Classifier**: a versioned keep/discard ruleset applied to every line
//!
//! # Modules
//!
//! - [`pipeline`]: the orchestrator
//! - [`classifier`]: line classification and its ruleset
//! - [`report`]: text and JSON rendering of results
//! - [`tool`]: the callable-tool boundary

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]

pub mod acquire;
pub mod classifier;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod telemetry;
pub mod tool;

pub use acquire::DocumentSource;
pub use config::AppConfig;
pub use document::{OverallStatus, PipelineResult};
pub use error::ExtractionError;
pub use pipeline::Pipeline;
pub use tool::{NativeTool, StatementExtractTool};
