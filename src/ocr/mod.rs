//! OCR Router: decides whether to OCR, calls the remote GPU OCR client
//! behind a circuit breaker, and falls back to the in-process parser.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{classify_transient, Error, Result};
use crate::models::OcrMode;
use crate::parser::{self, ParsedDocument};

/// Result of routing a document through OCR (or skipping it).
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub text: String,
    pub page_count: Option<u32>,
    pub ocr_method: OcrMethod,
}

/// Which path produced the normalized text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMethod {
    None,
    Gpu,
    ParserFallback,
}

impl OcrMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMethod::None => "none",
            OcrMethod::Gpu => "gpu",
            OcrMethod::ParserFallback => "parser_fallback",
        }
    }
}

/// Remote GPU-backed OCR call.
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn ocr(&self, bytes: &[u8], filename: &str) -> Result<OcrOutput>;
}

/// Decides whether a document's bytes represent a scanned (image-only)
/// document needing OCR. Heuristic detail (text density, image-to-text
/// ratio) is intentionally pluggable rather than hardcoded.
pub trait ScannedDocumentDetector: Send + Sync {
    fn is_scanned(&self, bytes: &[u8], filename: &str) -> bool;
}

/// Default detector: treats raster image types as scanned, and PDFs that
/// the in-process parser extracts negligible text from as scanned.
pub struct HeuristicScannedDetector;

impl ScannedDocumentDetector for HeuristicScannedDetector {
    fn is_scanned(&self, bytes: &[u8], filename: &str) -> bool {
        if let Some(kind) = infer::get(bytes) {
            if kind.mime_type().starts_with("image/") {
                return true;
            }
        }
        match parser::parse_document(bytes, filename, false) {
            Ok(parsed) => text_density(&parsed) < MIN_TEXT_DENSITY,
            Err(_) => true,
        }
    }
}

const MIN_TEXT_DENSITY: f64 = 20.0;

fn text_density(parsed: &ParsedDocument) -> f64 {
    let pages = parsed.page_count.unwrap_or(1).max(1) as f64;
    parsed.text.chars().count() as f64 / pages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Process-wide circuit breaker protecting the OCR Client call.
///
/// Three consecutive failures open the breaker; further calls short-circuit
/// to the fallback for `cooldown`, after which a single probe call is
/// allowed through in HALF_OPEN.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            cooldown,
        }
    }

    /// Whether a call should be attempted right now. Transitions OPEN ->
    /// HALF_OPEN once the cooldown has elapsed, admitting exactly one probe.
    fn should_attempt(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            _ => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
        }
    }

    #[cfg(test)]
    fn state(&self) -> BreakerState {
        self.inner.lock().state
    }
}

/// `reqwest`-backed [`OcrClient`] against a bearer-authenticated GPU OCR
/// service, with an independent, generous timeout to tolerate cold starts.
pub struct HttpOcrClient {
    http: reqwest::Client,
    service_url: String,
    token: String,
}

impl HttpOcrClient {
    pub fn new(service_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self { http, service_url: service_url.into(), token: token.into() }
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn ocr(&self, bytes: &[u8], filename: &str) -> Result<OcrOutput> {
        let response = self
            .http
            .post(format!("{}/ocr", self.service_url))
            .bearer_auth(&self.token)
            .header("x-filename", filename)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| classify_ocr_transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let combined = format!("HTTP {status}: {message}");
            return Err(if classify_transient(&combined) {
                Error::OcrTransient(combined)
            } else {
                Error::OcrFatal(combined)
            });
        }

        #[derive(serde::Deserialize)]
        struct OcrResponseBody {
            text: String,
            page_count: Option<u32>,
        }

        let body: OcrResponseBody = response
            .json()
            .await
            .map_err(|err| Error::OcrFatal(format!("malformed OCR response: {err}")))?;

        Ok(OcrOutput { text: body.text, page_count: body.page_count, ocr_method: OcrMethod::Gpu })
    }
}

fn classify_ocr_transport_error(err: &reqwest::Error) -> Error {
    let message = err.to_string();
    if err.is_timeout() || classify_transient(&message) {
        Error::OcrTransient(message)
    } else {
        Error::OcrFatal(message)
    }
}

/// Decides OCR mode, calls the OCR Client with circuit-breaker protection,
/// and falls back to the in-process parser on failure.
pub struct OcrRouter {
    client: Arc<dyn OcrClient>,
    breaker: CircuitBreaker,
    detector: Arc<dyn ScannedDocumentDetector>,
}

impl OcrRouter {
    pub fn new(
        client: Arc<dyn OcrClient>,
        failure_threshold: u32,
        cooldown: Duration,
        detector: Arc<dyn ScannedDocumentDetector>,
    ) -> Self {
        Self { client, breaker: CircuitBreaker::new(failure_threshold, cooldown), detector }
    }

    pub async fn route(&self, bytes: &[u8], filename: &str, mode: OcrMode) -> Result<OcrOutput> {
        match mode {
            OcrMode::Skip => self.parse_without_ocr(bytes, filename),
            OcrMode::Force => Ok(self.call_with_fallback(bytes, filename).await),
            OcrMode::Auto => {
                if self.detector.is_scanned(bytes, filename) {
                    Ok(self.call_with_fallback(bytes, filename).await)
                } else {
                    self.parse_without_ocr(bytes, filename)
                }
            }
        }
    }

    fn parse_without_ocr(&self, bytes: &[u8], filename: &str) -> Result<OcrOutput> {
        let parsed = parser::parse_document(bytes, filename, false)?;
        Ok(OcrOutput { text: parsed.text, page_count: parsed.page_count, ocr_method: OcrMethod::None })
    }

    async fn call_with_fallback(&self, bytes: &[u8], filename: &str) -> OcrOutput {
        if self.breaker.should_attempt() {
            match self.client.ocr(bytes, filename).await {
                Ok(output) => {
                    self.breaker.record_success();
                    return output;
                }
                Err(err) => {
                    warn!(error = %err, "OCR client call failed, falling back to in-process parser");
                    self.breaker.record_failure();
                }
            }
        } else {
            warn!("OCR circuit breaker open, short-circuiting to in-process parser");
        }

        self.fallback(bytes, filename)
    }

    fn fallback(&self, bytes: &[u8], filename: &str) -> OcrOutput {
        match parser::parse_document(bytes, filename, true) {
            Ok(parsed) => OcrOutput {
                text: parsed.text,
                page_count: parsed.page_count,
                ocr_method: OcrMethod::ParserFallback,
            },
            Err(_) => OcrOutput { text: String::new(), page_count: None, ocr_method: OcrMethod::ParserFallback },
        }
    }
}
