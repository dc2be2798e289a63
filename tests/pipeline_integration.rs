mod common;

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use common::{ScriptedBackend, inline, pipeline_with, png, statement_pdf};
use statement_extract::document::{DocumentKind, ExtractionMethod, PageStatus};
use statement_extract::error::{AcquisitionError, OcrBackendError};
use statement_extract::{AppConfig, DocumentSource, ExtractionError, OverallStatus, report};

#[test]
fn test_transaction_kept_and_boilerplate_dropped() {
    let pdf = statement_pdf(&[&[
        "EXTRATO DE CONTA CORRENTE",
        "12/03/2024  PIX RECEBIDO  R$ 150,00",
        "Fale com a nossa ouvidoria",
    ]]);
    let result = pipeline_with(&AppConfig::default(), 0, None).run(&inline(&pdf, "extrato.pdf"));

    assert_eq!(result.status, OverallStatus::Success);
    assert_eq!(result.kind, Some(DocumentKind::Pdf));
    let kept: Vec<&str> = result.retained_lines().map(|l| l.text.as_str()).collect();
    assert!(kept.contains(&"12/03/2024  PIX RECEBIDO  R$ 150,00"));
    assert!(!kept.iter().any(|l| l.contains("ouvidoria")));

    let text = report::render(&result);
    assert!(text.contains("--- PAGE 1 ---\nmethod: native\n"));
    assert!(text.contains("12/03/2024  PIX RECEBIDO  R$ 150,00\n"));
    assert!(!text.contains("ouvidoria"));
}

#[test]
fn test_image_only_page_escalates_to_ocr() {
    let backend = Arc::new(ScriptedBackend::new().page(0, "SALDO DO DIA\n05/01 TED ENVIADA 1.200,00"));
    let pipeline = pipeline_with(&AppConfig::default(), 1, Some(Arc::clone(&backend)));
    let result = pipeline.run(&inline(&statement_pdf(&[&[]]), "scan.pdf"));

    assert_eq!(result.status, OverallStatus::Success);
    assert!(result.escalated);
    assert_eq!(backend.calls(), 1);
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].method, ExtractionMethod::Ocr);
    assert_eq!(result.pages[0].retained_count(), 2);
}

#[test]
fn test_native_text_page_blocks_escalation() {
    let backend = Arc::new(ScriptedBackend::new().page(1, "PIX 10,00"));
    let pipeline = pipeline_with(&AppConfig::default(), 2, Some(Arc::clone(&backend)));
    let result = pipeline.run(&inline(&statement_pdf(&[&[], &["SALDO ANTERIOR 100,00"]]), "s.pdf"));

    assert_eq!(backend.calls(), 0);
    assert!(!result.escalated);
    assert_eq!(result.pages[0].status, PageStatus::NoText);
    assert_eq!(result.pages[1].status, PageStatus::Ok);
}

#[test]
fn test_boilerplate_only_is_empty_after_filter() {
    let pdf = statement_pdf(&[&[
        "Fale com a nossa ouvidoria",
        "Central de atendimento 24 horas",
        "www.banco.com.br",
    ]]);
    let result = pipeline_with(&AppConfig::default(), 0, None).run(&inline(&pdf, "s.pdf"));

    assert_eq!(result.status, OverallStatus::EmptyAfterFilter);
    assert!(matches!(
        result.error(),
        Some(ExtractionError::EmptyAfterFilter {
            pages_with_text: 1,
            lines: 3,
            ..
        })
    ));
    assert!(report::render(&result).contains("[no lines retained]"));
}

#[test]
fn test_malformed_base64_fails_before_any_page() {
    let backend = Arc::new(ScriptedBackend::new());
    let pipeline = pipeline_with(&AppConfig::default(), 1, Some(Arc::clone(&backend)));
    let result = pipeline.run(&DocumentSource::inline("not*base64!", Some("s.pdf")));

    assert_eq!(result.status, OverallStatus::Error);
    assert!(result.pages.is_empty());
    assert_eq!(backend.calls(), 0);
    assert!(matches!(
        result.error(),
        Some(ExtractionError::Acquisition(AcquisitionError::Decode(_)))
    ));
}

#[test]
fn test_ocr_failure_is_confined_to_its_page() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .page(0, "01/02 PIX RECEBIDO 50,00")
            .failing(
                1,
                OcrBackendError::Auth {
                    backend: "scripted",
                    status: 401,
                    body: "invalid key".to_string(),
                },
            )
            .page(2, "03/02 TARIFA PACOTE 19,90"),
    );
    let pipeline = pipeline_with(&AppConfig::default(), 3, Some(Arc::clone(&backend)));
    let result = pipeline.run(&inline(&statement_pdf(&[&[], &[], &[]]), "s.pdf"));

    assert_eq!(backend.calls(), 3);
    assert_eq!(result.status, OverallStatus::Success);
    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.pages[0].status, PageStatus::Ok);
    assert_eq!(result.pages[1].status, PageStatus::Error);
    assert!(
        result.pages[1]
            .notice
            .as_deref()
            .unwrap()
            .contains("authentication failed")
    );
    assert_eq!(result.pages[2].status, PageStatus::Ok);

    let text = report::render(&result);
    assert!(text.contains("--- PAGE 2 ---\nmethod: ocr\n[error] scripted authentication failed (401)"));
}

#[test]
fn test_ocr_finding_nothing_is_no_extractable_text() {
    let backend = Arc::new(ScriptedBackend::new());
    let pipeline = pipeline_with(&AppConfig::default(), 2, Some(Arc::clone(&backend)));
    let result = pipeline.run(&inline(&statement_pdf(&[&[], &[]]), "s.pdf"));

    assert_eq!(result.status, OverallStatus::NoExtractableText);
    assert!(result.escalated);
    assert!(result.pages.iter().all(|p| p.status == PageStatus::NoText));
    assert!(matches!(
        result.error(),
        Some(ExtractionError::NoText {
            pages: 2,
            ocr_attempted: true
        })
    ));
}

#[test]
fn test_image_document_goes_straight_to_ocr() {
    let backend = Arc::new(ScriptedBackend::new().page(0, "10/04 COMPRA CARTAO 89,90"));
    let pipeline = pipeline_with(&AppConfig::default(), 0, Some(Arc::clone(&backend)));
    let result = pipeline.run(&inline(&png(8, 8), "foto.png"));

    assert_eq!(result.kind, Some(DocumentKind::Image));
    assert_eq!(result.page_count, Some(1));
    assert_eq!(result.status, OverallStatus::Success);
    assert!(!result.escalated);
    assert_eq!(result.pages[0].method, ExtractionMethod::Ocr);
}

#[test]
fn test_image_without_backend_has_no_text() {
    let result = pipeline_with(&AppConfig::default(), 0, None).run(&inline(&png(8, 8), "foto.png"));
    assert_eq!(result.status, OverallStatus::NoExtractableText);
    assert_eq!(result.pages[0].status, PageStatus::NoText);
}

#[test]
fn test_local_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extrato.pdf");
    std::fs::write(&path, statement_pdf(&[&["15/05 SAQUE 24H 200,00"]])).unwrap();

    let result = pipeline_with(&AppConfig::default(), 0, None)
        .run(&DocumentSource::file(path.display().to_string()));
    assert!(result.is_success());
    assert!(result.source.starts_with("file:"));
}

#[test]
fn test_missing_local_file() {
    let result = pipeline_with(&AppConfig::default(), 0, None)
        .run(&DocumentSource::file("/nonexistent/extrato.pdf"));
    assert_eq!(result.status, OverallStatus::Error);
    assert!(matches!(
        result.error(),
        Some(ExtractionError::Acquisition(AcquisitionError::NotFound(_)))
    ));
}

#[test]
fn test_data_url_payload() {
    let pdf = statement_pdf(&[&["12/03/2024  PIX RECEBIDO  R$ 150,00"]]);
    let content = format!("data:application/pdf;base64,{}", STANDARD.encode(pdf));
    let result = pipeline_with(&AppConfig::default(), 0, None).run(&DocumentSource::inline(content, None));
    assert!(result.is_success());
}

#[test]
fn test_json_report() {
    let pdf = statement_pdf(&[&["12/03/2024  PIX RECEBIDO  R$ 150,00"]]);
    let result = pipeline_with(&AppConfig::default(), 0, None).run(&inline(&pdf, "s.pdf"));
    let json: serde_json::Value =
        serde_json::from_str(&report::render_json(&result).unwrap()).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["kind"], "pdf");
    assert_eq!(json["pages"][0]["lines"][0]["verdict"]["keep"], "dated_amount");
}
