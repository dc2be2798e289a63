use crate::report::OutputFormat;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "statement-extract.yaml";

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "statement-extract",
    author,
    version,
    about = "Extract transaction lines from a bank or credit-card statement",
    long_about = None
)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Local path or http(s) URL of the statement
    #[arg(long, conflicts_with = "content")]
    pub file_path: Option<String>,

    /// Base64-encoded statement bytes
    #[arg(long)]
    pub content: Option<String>,

    /// Original file name of the inline content
    #[arg(long, requires = "content")]
    pub filename: Option<String>,

    /// MIME type of the inline content
    #[arg(long, requires = "content")]
    pub content_type: Option<String>,

    /// OCR backend: auto, tesseract, vision, mistral or disabled
    #[arg(long)]
    pub ocr_backend: Option<String>,

    /// Skip native extraction and go straight to OCR
    #[arg(long)]
    pub force_ocr: bool,

    /// Process at most this many pages (0 = all)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "STMT_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub acquisition: AcquisitionConfig,
    pub ocr: OcrConfig,
    pub vision: VisionConfig,
    pub mistral: MistralConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Go straight to OCR even for PDFs with a text layer.
    pub force_ocr: bool,
    /// Page limit; 0 processes every page.
    pub max_pages: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
    /// Directory for download spool files; the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 25 * 1024 * 1024,
            spool_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: String,
    pub dpi: u32,
    pub pdftoppm_binary: String,
    pub tesseract_binary: String,
    pub tesseract_language: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            dpi: 300,
            pdftoppm_binary: "pdftoppm".to_string(),
            tesseract_binary: "tesseract".to_string(),
            tesseract_language: "por+eng".to_string(),
            timeout_secs: 60,
        }
    }
}

/// OpenAI-compatible vision model used as an OCR backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VisionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Set for Azure OpenAI endpoints.
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    /// Longest edge, in pixels, of images sent upstream.
    pub max_image_dimension: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            azure_deployment: None,
            azure_api_version: None,
            max_image_dimension: 2048,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MistralConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "mistral-ocr-latest".to_string(),
            base_url: "https://api.mistral.ai".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, config file, `STMT_` environment and CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Config file: explicit path must exist, the cwd default is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(Path::new(path)).required(true)),
            None => builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };

        // 2. Environment, e.g. STMT_OCR__BACKEND=tesseract
        builder = builder.add_source(
            Environment::with_prefix("STMT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 3. CLI overrides
        if let Some(backend) = &cli.ocr_backend {
            builder = builder.set_override("ocr.backend", backend.as_str())?;
        }
        if cli.force_ocr {
            builder = builder.set_override("extraction.force_ocr", true)?;
        }
        if let Some(max_pages) = cli.max_pages {
            builder = builder.set_override("extraction.max_pages", max_pages.to_string())?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.apply_credential_fallbacks();
        Ok(cfg)
    }

    /// Fill missing API keys from the providers' conventional variables.
    fn apply_credential_fallbacks(&mut self) {
        if non_empty(self.vision.api_key.as_deref()).is_none() {
            self.vision.api_key = env_key("OPENAI_API_KEY");
        }
        if non_empty(self.mistral.api_key.as_deref()).is_none() {
            self.mistral.api_key = env_key("MISTRAL_API_KEY");
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// `Some` only for values with visible content.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
