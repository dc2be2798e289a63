//! `statement-extract` command-line entry point.
//!
//! Extracts one statement and prints the report to stdout. Exit status is 0
//! on success, 2 when the document yielded no transaction lines, 1 on error.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::info;

use statement_extract::config::{AppConfig, Cli};
use statement_extract::report;
use statement_extract::{DocumentSource, OverallStatus, Pipeline, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env (if present) before clap reads env-backed flags
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let config = AppConfig::from_cli(&cli).context("Configuration error")?;
    info!(
        name: "config.loaded",
        ocr_backend = %config.ocr.backend,
        force_ocr = config.extraction.force_ocr,
        max_pages = config.extraction.max_pages,
        "configuration loaded"
    );

    let source = DocumentSource::from_parts(
        cli.file_path.clone(),
        cli.content.clone(),
        cli.filename.clone(),
        cli.content_type.clone(),
    )
    .context("Invalid document arguments")?;

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let result = pipeline.run_async(source).await?;

    println!("{}", report::render_as(&result, cli.format)?.trim_end());

    Ok(match result.status {
        OverallStatus::Success => ExitCode::SUCCESS,
        OverallStatus::EmptyAfterFilter | OverallStatus::NoExtractableText => ExitCode::from(2),
        OverallStatus::Error => ExitCode::FAILURE,
    })
}
