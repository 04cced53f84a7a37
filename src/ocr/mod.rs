//! Text recognition providers.
//!
//! Every provider implements [`OcrProvider`]. The loops only see the trait;
//! the concrete provider is picked once at startup by [`create_provider`].

pub mod baidu;
pub mod engine;
pub mod preprocess;
pub mod recording;
pub mod setup;

pub use baidu::{ApiKeys, BaiduOcr, OcrKeys};
pub use engine::TesseractOcr;
pub use recording::RecordingOcr;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::automation::config::AppConfig;
use crate::paths;

#[derive(Error, Debug)]
pub enum OcrError {
    /// Cloud credentials are missing, expired or rejected. The caller should
    /// ask for new keys and retry the whole operation.
    #[error("OCR credentials need to be refreshed")]
    NeedsCredentialRefresh,

    #[error("OCR engine not found: {0}")]
    EngineNotFound(String),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR provider error: {0}")]
    Provider(String),

    #[error("接口返回数据错误，请重试或检查：{0}")]
    MalformedResponse(String),

    #[error("image不能为空")]
    EmptyImage,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Four corners, clockwise from top-left, in pixels of the scanned image.
pub type Quad = [(i32, i32); 4];

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedItem {
    pub region: Quad,
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
}

impl DetectedItem {
    pub fn new(region: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }

    /// Axis-aligned quad from a top-left corner and a size.
    pub fn from_box(left: i32, top: i32, width: i32, height: i32, text: impl Into<String>, confidence: f32) -> Self {
        let (right, bottom) = (left + width, top + height);
        Self::new(
            [(left, top), (right, top), (right, bottom), (left, bottom)],
            text,
            confidence,
        )
    }

    /// Centre of the region (mean of the corners).
    pub fn center(&self) -> (i32, i32) {
        let (sx, sy) = self
            .region
            .iter()
            .fold((0, 0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / 4, sy / 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Regions and confidence along with the text.
    Detailed,
    /// Text only.
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutput {
    Detailed(Vec<DetectedItem>),
    Text(Vec<String>),
}

impl ScanOutput {
    pub fn len(&self) -> usize {
        match self {
            ScanOutput::Detailed(items) => items.len(),
            ScanOutput::Text(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Image bytes in, text out.
///
/// Providers are shared between worker threads and must not block other
/// callers while one scan is in flight.
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Recognizes text in a PNG/JPEG image. `downscale` in (0, 1) shrinks the
    /// image first to bound latency; regions are always reported in pixels
    /// of the input image.
    fn scan(&self, image: &[u8], mode: ScanMode, downscale: f32) -> Result<ScanOutput, OcrError>;

    /// True when the provider cannot scan until credentials are supplied.
    fn needs_credentials(&self) -> bool {
        false
    }

    fn scan_detailed(&self, image: &[u8], downscale: f32) -> Result<Vec<DetectedItem>, OcrError> {
        match self.scan(image, ScanMode::Detailed, downscale)? {
            ScanOutput::Detailed(items) => Ok(items),
            ScanOutput::Text(_) => Err(OcrError::MalformedResponse(
                "text-only result for a detailed scan".to_string(),
            )),
        }
    }

    fn scan_text(&self, image: &[u8]) -> Result<Vec<String>, OcrError> {
        match self.scan(image, ScanMode::Text, 1.0)? {
            ScanOutput::Text(lines) => Ok(lines),
            ScanOutput::Detailed(items) => Ok(items.into_iter().map(|i| i.text).collect()),
        }
    }
}

/// Available providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OcrProviderKind {
    /// Tesseract on this machine
    #[default]
    Local,
    /// Baidu cloud OCR
    Baidu,
}

impl fmt::Display for OcrProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrProviderKind::Local => write!(f, "local"),
            OcrProviderKind::Baidu => write!(f, "baidu"),
        }
    }
}

/// Builds the provider for `kind`. In debug mode the provider is wrapped so
/// every scanned image is saved with its detections.
pub fn create_provider(kind: OcrProviderKind, config: &AppConfig) -> Result<Arc<dyn OcrProvider>, OcrError> {
    let provider: Arc<dyn OcrProvider> = match kind {
        OcrProviderKind::Local => Arc::new(TesseractOcr::new(&config.local_ocr)?),
        OcrProviderKind::Baidu => {
            let keys = OcrKeys::load(&paths::get_private_keys_path());
            Arc::new(BaiduOcr::new(
                keys.baidu.as_ref(),
                Duration::from_secs(config.request_timeout_secs),
            )?)
        }
    };
    tracing::info!("OCR provider: {}", provider.name());

    if config.debug_mode {
        Ok(Arc::new(RecordingOcr::new(
            provider,
            paths::get_debug_screenshots_dir(),
        )))
    } else {
        Ok(provider)
    }
}
