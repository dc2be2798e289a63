//! Callable-tool adapter so an agent runtime can invoke the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::acquire::DocumentSource;
use crate::pipeline::Pipeline;
use crate::report::{self, OutputFormat};

/// A tool implemented in-process rather than behind an MCP server.
#[async_trait]
pub trait NativeTool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

#[derive(Debug, Deserialize)]
struct ExtractArgs {
    file_path: Option<String>,
    content: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    format: Option<String>,
}

/// Extracts transaction lines from a bank statement.
#[derive(Debug)]
pub struct StatementExtractTool {
    pipeline: Arc<Pipeline>,
}

impl StatementExtractTool {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl NativeTool for StatementExtractTool {
    fn name(&self) -> &str {
        "statement_extract"
    }

    fn description(&self) -> &str {
        "Extract the transaction lines from a bank statement (PDF or scanned image). \
         Pass either `file_path` (local path or http(s) URL) or base64 `content`. \
         Returns the retained lines page by page."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Local path or http(s) URL of the statement."
                },
                "content": {
                    "type": "string",
                    "description": "Base64-encoded document. Mutually exclusive with file_path."
                },
                "filename": {
                    "type": "string",
                    "description": "Original file name of the inline content, used to detect its type."
                },
                "content_type": {
                    "type": "string",
                    "description": "MIME type of the inline content."
                },
                "format": {
                    "type": "string",
                    "enum": ["text", "json"],
                    "description": "Report format (default text)."
                }
            }
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let args: ExtractArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid arguments: {e}"))?;
        let format = match args.format.as_deref() {
            None | Some("text") => OutputFormat::Text,
            Some("json") => OutputFormat::Json,
            Some(other) => anyhow::bail!("Unknown format '{other}': expected text or json"),
        };
        let source =
            DocumentSource::from_parts(args.file_path, args.content, args.filename, args.content_type)?;

        info!(name: "tool.call", tool = self.name(), source = %source.describe(), "tool invoked");
        let result = self.pipeline.run_async(source).await?;
        Ok(Value::String(report::render_as(&result, format)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::ocr::PdftoppmRasterizer;

    fn tool() -> StatementExtractTool {
        let config = AppConfig::default();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(PdftoppmRasterizer::new(&config.ocr)),
            None,
        );
        StatementExtractTool::new(Arc::new(pipeline))
    }

    #[test]
    fn test_schema_lists_both_source_forms() {
        let schema = tool().schema();
        assert!(schema["properties"]["file_path"].is_object());
        assert!(schema["properties"]["content"].is_object());
    }

    #[tokio::test]
    async fn test_rejects_both_sources() {
        let err = tool()
            .call(json!({ "file_path": "a.pdf", "content": "JVBERi0=" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[tokio::test]
    async fn test_rejects_neither_source() {
        assert!(tool().call(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_a_report() {
        let out = tool()
            .call(json!({ "content": "%%% not base64 %%%" }))
            .await
            .unwrap();
        let text = out.as_str().unwrap();
        assert!(text.starts_with("status: error"));
        assert!(text.contains("not valid base64"));
    }
}
