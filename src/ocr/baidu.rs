//! Baidu cloud OCR.
//!
//! Auth is an OAuth client-credentials token derived from an API key pair
//! stored in `private.json`. Without a token the provider reports
//! [`OcrError::NeedsCredentialRefresh`] instead of scanning.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use super::{DetectedItem, OcrError, OcrProvider, Quad, ScanMode, ScanOutput};

const BASE_URL: &str = "https://aip.baidubce.com";

/// Token errors: invalid or expired access token.
const TOKEN_ERROR_CODES: [i64; 2] = [110, 111];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    pub api_key: String,
    pub secret_key: String,
}

/// Contents of `private.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrKeys {
    #[serde(default, rename = "baidu_ocr", skip_serializing_if = "Option::is_none")]
    pub baidu: Option<ApiKeys>,
}

impl OcrKeys {
    /// Reads the key file; a missing or unreadable file yields no keys.
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&contents) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}. Ignoring keys.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), OcrError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiVersion {
    General,
    Accurate,
}

impl ApiVersion {
    fn endpoint(self, mode: ScanMode) -> &'static str {
        match (self, mode) {
            (ApiVersion::General, ScanMode::Detailed) => "general",
            (ApiVersion::General, ScanMode::Text) => "general_basic",
            (ApiVersion::Accurate, ScanMode::Detailed) => "accurate",
            (ApiVersion::Accurate, ScanMode::Text) => "accurate_basic",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct OcrResponse {
    error_code: Option<i64>,
    error_msg: Option<String>,
    words_result: Option<Vec<WordResult>>,
}

#[derive(Deserialize)]
struct WordResult {
    words: String,
    #[serde(default)]
    vertexes_location: Vec<Vertex>,
    probability: Option<Probability>,
}

#[derive(Deserialize)]
struct Vertex {
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct Probability {
    average: f32,
}

pub struct BaiduOcr {
    http: reqwest::blocking::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    version: RwLock<ApiVersion>,
}

impl BaiduOcr {
    /// Builds the client and tries to obtain a token. A failed token request
    /// is logged and leaves the provider waiting for credentials.
    pub fn new(keys: Option<&ApiKeys>, timeout: Duration) -> Result<Self, OcrError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let provider = Self {
            http,
            base_url: BASE_URL.to_string(),
            token: RwLock::new(None),
            version: RwLock::new(ApiVersion::General),
        };
        match keys {
            Some(keys) => {
                if let Err(e) = provider.refresh_access_token(keys) {
                    tracing::warn!("Baidu OCR token request failed: {}", e);
                }
            }
            None => tracing::warn!("Baidu OCR keys are not set"),
        }
        Ok(provider)
    }

    /// Exchanges the key pair for an access token.
    pub fn refresh_access_token(&self, keys: &ApiKeys) -> Result<(), OcrError> {
        let url = format!("{}/oauth/2.0/token", self.base_url);
        tracing::debug!("==> POST {}", url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", keys.api_key.as_str()),
                ("client_secret", keys.secret_key.as_str()),
            ])
            .send()?;
        let status = response.status();
        let body = response.text()?;
        tracing::debug!("<== {} {}", status, truncate(&body, 100));

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        self.set_token(parsed.access_token.clone());
        match parsed.access_token {
            Some(_) => Ok(()),
            None => Err(OcrError::Provider(
                parsed
                    .error_description
                    .unwrap_or_else(|| "no access_token in response".to_string()),
            )),
        }
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn current_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn current_version(&self) -> ApiVersion {
        *self.version.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Decodes a recognition response; switches to the accurate API when the
    /// response has no `words_result`.
    fn interpret(&self, body: &str, mode: ScanMode) -> Result<ScanOutput, OcrError> {
        let result = parse_ocr_response(body, mode);
        match &result {
            Err(OcrError::NeedsCredentialRefresh) => self.set_token(None),
            Err(OcrError::MalformedResponse(_)) => {
                *self.version.write().unwrap_or_else(|e| e.into_inner()) = ApiVersion::Accurate;
            }
            _ => {}
        }
        result
    }
}

impl OcrProvider for BaiduOcr {
    fn name(&self) -> &str {
        "baidu"
    }

    fn needs_credentials(&self) -> bool {
        self.current_token().is_none()
    }

    /// Downscaling is left to the service.
    fn scan(&self, image: &[u8], mode: ScanMode, _downscale: f32) -> Result<ScanOutput, OcrError> {
        let Some(token) = self.current_token() else {
            tracing::error!("token不能为空");
            return Err(OcrError::NeedsCredentialRefresh);
        };
        if image.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        let url = format!(
            "{}/rest/2.0/ocr/v1/{}",
            self.base_url,
            self.current_version().endpoint(mode)
        );
        let detail = if mode == ScanMode::Detailed { "true" } else { "false" };
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        tracing::debug!("==> POST {} ({} bytes)", url, encoded.len());
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", token.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("vertexes_location", detail),
                ("probability", detail),
                ("image", encoded.as_str()),
            ])
            .send()?;
        let status = response.status();
        let body = response.text()?;
        tracing::debug!("<== {} {}", status, truncate(&body, 100));

        self.interpret(&body, mode)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn parse_ocr_response(body: &str, mode: ScanMode) -> Result<ScanOutput, OcrError> {
    let response: OcrResponse = serde_json::from_str(body)?;

    if let Some(code) = response.error_code {
        if TOKEN_ERROR_CODES.contains(&code) {
            return Err(OcrError::NeedsCredentialRefresh);
        }
        return Err(OcrError::Provider(format!(
            "{} {}",
            code,
            response.error_msg.unwrap_or_default()
        )));
    }

    let words = response
        .words_result
        .ok_or_else(|| OcrError::MalformedResponse("words_result".to_string()))?;

    match mode {
        ScanMode::Text => Ok(ScanOutput::Text(words.into_iter().map(|w| w.words).collect())),
        ScanMode::Detailed => words
            .into_iter()
            .map(|w| {
                let region: Quad = match w.vertexes_location.as_slice() {
                    [a, b, c, d, ..] => [(a.x, a.y), (b.x, b.y), (c.x, c.y), (d.x, d.y)],
                    _ => {
                        return Err(OcrError::MalformedResponse(
                            "vertexes_location".to_string(),
                        ))
                    }
                };
                let confidence = w.probability.map_or(0.0, |p| p.average);
                Ok(DetectedItem::new(region, w.words, confidence))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ScanOutput::Detailed),
    }
}
