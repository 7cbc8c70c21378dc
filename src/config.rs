//! Configuration types for a batch transcription run.
//!
//! All run behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The input and output directories are passed to
//! [`crate::batch::run_batch`] separately, so one config can drive several
//! directories.

use crate::error::ScanError;
use crate::output::ArtifactKind;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::VisionEndpoint;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a batch run.
///
/// # Example
/// ```rust
/// use scanscribe::{BatchConfig, PipelineMode};
///
/// let config = BatchConfig::builder()
///     .mode(PipelineMode::TwoStep)
///     .model("llama3.2-vision")
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.retry.max_attempts, 5);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Whether the model's first answer is final or refined against local OCR.
    pub mode: PipelineMode,

    /// Which request/response shape the endpoint speaks. Default: Ollama chat.
    pub flavor: ApiFlavor,

    /// Base URL of the model server, without the API path.
    pub endpoint_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model to copy, not to create.
    pub temperature: f32,

    /// Retry behaviour shared by every remote call.
    pub retry: RetryPolicy,

    /// Path or name of the tesseract executable.
    pub tesseract_binary: String,

    /// Tesseract language code (`-l`), e.g. `eng`, `fas`, `eng+deu`.
    pub ocr_language: String,

    /// Include the local OCR text in the first prompt as a reference.
    pub ocr_hint: bool,

    /// In two-step mode, reuse a saved intermediate transcription instead of
    /// repeating the first remote call when an item is resumed.
    pub reuse_intermediate: bool,

    /// Pre-constructed remote endpoint. Takes precedence over `flavor`/`endpoint_url`.
    pub endpoint: Option<Arc<dyn VisionEndpoint>>,

    /// Pre-constructed local extractor. Takes precedence over the tesseract settings.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Receives per-item events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            flavor: ApiFlavor::default(),
            endpoint_url: ApiFlavor::default().default_base_url().to_string(),
            model: "Gemma3-27b-q5-vision:latest".to_string(),
            temperature: 0.1,
            retry: RetryPolicy::default(),
            tesseract_binary: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            ocr_hint: false,
            reuse_intermediate: false,
            endpoint: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("mode", &self.mode)
            .field("flavor", &self.flavor)
            .field("endpoint_url", &self.endpoint_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("retry", &self.retry)
            .field("tesseract_binary", &self.tesseract_binary)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_hint", &self.ocr_hint)
            .field("reuse_intermediate", &self.reuse_intermediate)
            .field("endpoint", &self.endpoint.as_ref().map(|_| "<dyn VisionEndpoint>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
            url_set: false,
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
    url_set: bool,
}

impl BatchConfigBuilder {
    pub fn mode(mut self, mode: PipelineMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Select the wire shape. Unless [`Self::endpoint_url`] is also called,
    /// the base URL follows the flavor's usual local default.
    pub fn flavor(mut self, flavor: ApiFlavor) -> Self {
        self.config.flavor = flavor;
        if !self.url_set {
            self.config.endpoint_url = flavor.default_base_url().to_string();
        }
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self.url_set = true;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.retry.request_timeout = timeout;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.retry_delay = delay;
        self
    }

    pub fn tesseract_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.tesseract_binary = binary.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_hint(mut self, v: bool) -> Self {
        self.config.ocr_hint = v;
        self
    }

    pub fn reuse_intermediate(mut self, v: bool) -> Self {
        self.config.reuse_intermediate = v;
        self
    }

    pub fn endpoint(mut self, endpoint: Arc<dyn VisionEndpoint>) -> Self {
        self.config.endpoint = Some(endpoint);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, ScanError> {
        let c = &self.config;
        if c.retry.max_attempts == 0 {
            return Err(ScanError::InvalidConfig(
                "max_attempts must be ≥ 1 (it counts the first attempt)".into(),
            ));
        }
        if c.retry.request_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "request_timeout must be greater than zero".into(),
            ));
        }
        if c.reuse_intermediate && c.mode != PipelineMode::TwoStep {
            return Err(ScanError::InvalidConfig(
                "reuse_intermediate only applies to two-step mode".into(),
            ));
        }
        if c.endpoint.is_none() {
            if c.model.trim().is_empty() {
                return Err(ScanError::InvalidConfig("model must not be empty".into()));
            }
            if c.endpoint_url.trim().is_empty() {
                return Err(ScanError::InvalidConfig(
                    "endpoint URL must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How many remote turns each item gets, fixed for the whole run.
///
/// | Mode | Remote calls | Files per item |
/// |------|--------------|----------------|
/// | `SingleStep` | 1 | 2 (`_tesseract`, `_ollama`) |
/// | `TwoStep` | 2 | 3 (adds `_ollama_intermediate`) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelineMode {
    /// The model's first transcription is final. (default)
    #[default]
    SingleStep,
    /// The first transcription is reconciled against the local OCR text in a
    /// second conversational turn.
    TwoStep,
}

impl PipelineMode {
    /// Per-item artifact files this mode produces.
    pub fn artifact_kinds(self) -> &'static [ArtifactKind] {
        match self {
            PipelineMode::SingleStep => &[ArtifactKind::Primary, ArtifactKind::RemoteFinal],
            PipelineMode::TwoStep => &[
                ArtifactKind::Primary,
                ArtifactKind::RemoteIntermediate,
                ArtifactKind::RemoteFinal,
            ],
        }
    }

    /// Remote calls made for one item when nothing is reused.
    pub fn remote_calls(self) -> u32 {
        match self {
            PipelineMode::SingleStep => 1,
            PipelineMode::TwoStep => 2,
        }
    }
}

/// Wire shape spoken by the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiFlavor {
    /// Ollama `/api/chat`: `{model, messages: [{role, content, images}]}`. (default)
    #[default]
    OllamaChat,
    /// Ollama `/api/generate`: single prompt, `{response}` back.
    OllamaGenerate,
    /// OpenAI-compatible `/v1/chat/completions` (LM Studio, vLLM, …).
    OpenAi,
}

impl ApiFlavor {
    /// Path appended to the base URL.
    pub fn path(self) -> &'static str {
        match self {
            ApiFlavor::OllamaChat => "/api/chat",
            ApiFlavor::OllamaGenerate => "/api/generate",
            ApiFlavor::OpenAi => "/v1/chat/completions",
        }
    }

    /// Where a locally running server of this kind usually listens.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiFlavor::OllamaChat | ApiFlavor::OllamaGenerate => "http://localhost:11434",
            ApiFlavor::OpenAi => "http://localhost:1234",
        }
    }
}

/// Bounded retry-with-fixed-delay applied identically to every remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. Default: 3.
    pub max_attempts: u32,

    /// Per-attempt deadline. Default: 300 s.
    ///
    /// A large vision model on a workstation GPU can take minutes on a dense
    /// page, so this errs long.
    pub request_timeout: Duration,

    /// Fixed pause between attempts. Default: 5 s.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(300),
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Upper bound on the time one remote call can block the pipeline.
    pub fn worst_case(&self) -> Duration {
        (self.request_timeout + self.retry_delay) * self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BatchConfig::default();
        assert_eq!(c.mode, PipelineMode::SingleStep);
        assert_eq!(c.flavor, ApiFlavor::OllamaChat);
        assert_eq!(c.endpoint_url, "http://localhost:11434");
        assert_eq!(c.retry.max_attempts, 3);
        assert!(!c.ocr_hint);
        assert!(!c.reuse_intermediate);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = BatchConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn empty_model_rejected() {
        assert!(BatchConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn flavor_sets_default_url_unless_overridden() {
        let c = BatchConfig::builder().flavor(ApiFlavor::OpenAi).build().unwrap();
        assert_eq!(c.endpoint_url, "http://localhost:1234");

        let c = BatchConfig::builder()
            .endpoint_url("http://gpu-box:8080")
            .flavor(ApiFlavor::OpenAi)
            .build()
            .unwrap();
        assert_eq!(c.endpoint_url, "http://gpu-box:8080");
    }

    #[test]
    fn reuse_intermediate_requires_two_step() {
        let err = BatchConfig::builder()
            .reuse_intermediate(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));

        let c = BatchConfig::builder()
            .reuse_intermediate(true)
            .mode(PipelineMode::TwoStep)
            .build()
            .unwrap();
        assert!(c.reuse_intermediate);
    }

    #[test]
    fn artifact_counts_by_mode() {
        assert_eq!(PipelineMode::SingleStep.artifact_kinds().len(), 2);
        assert_eq!(PipelineMode::TwoStep.artifact_kinds().len(), 3);
        assert_eq!(PipelineMode::TwoStep.remote_calls(), 2);
    }

    #[test]
    fn worst_case_latency() {
        let p = RetryPolicy {
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
        };
        assert_eq!(p.worst_case(), Duration::from_secs(36));
    }
}
