//! Remote refinement: build vision conversations and call the model.
//!
//! Wording lives in [`crate::prompts`] and body shapes in
//! [`crate::pipeline::wire`]; this module owns the call protocol and the
//! retry policy.
//!
//! ## Protocol
//!
//! 1. **Transcribe** — one user turn with the image and
//!    [`crate::prompts::TRANSCRIBE_PROMPT`]. The reply is the initial text.
//! 2. **Refine** *(two-step only)* — the same history plus the model's reply
//!    and a user turn carrying the local OCR text. The reply is final.
//!
//! ## Retry Strategy
//!
//! Every call goes through [`call_with_retry`]: up to `max_attempts` tries,
//! each bounded by `request_timeout`, with a fixed `retry_delay` between
//! them. Local model servers fail in bursts (model loading, GPU OOM), so a
//! flat pause is enough; there is no concurrent herd to back off from.
//! Malformed 2xx bodies are returned at once since retrying cannot fix them.

use crate::config::{ApiFlavor, BatchConfig, PipelineMode, RetryPolicy};
use crate::error::{RemoteError, ScanError};
use crate::output::RemoteText;
use crate::pipeline::encode::{encode_file, EncodedImage};
use crate::pipeline::input::ImageItem;
use crate::pipeline::wire::{build_body, parse_reply, Conversation};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::{refine_prompt, transcribe_with_hint, TRANSCRIBE_PROMPT};
use async_trait::async_trait;
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Longest slice of an error body kept in [`RemoteError::Status`].
const MAX_ERROR_BODY: usize = 300;

/// A vision-capable model that answers a conversation with text.
#[async_trait]
pub trait VisionEndpoint: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Perform exactly one call. Retrying is the caller's job.
    async fn complete(&self, conversation: &Conversation) -> Result<String, RemoteError>;
}

/// [`VisionEndpoint`] over HTTP for any [`ApiFlavor`].
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
    flavor: ApiFlavor,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn from_config(config: &BatchConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.retry.request_timeout)
            .build()
            .map_err(|e| ScanError::EndpointNotConfigured {
                hint: format!("Failed to build HTTP client: {e}"),
            })?;

        let url = format!(
            "{}{}",
            config.endpoint_url.trim_end_matches('/'),
            config.flavor.path()
        );
        reqwest::Url::parse(&url).map_err(|e| ScanError::EndpointNotConfigured {
            hint: format!("'{url}' is not a valid URL: {e}\nPass e.g. --endpoint http://localhost:11434"),
        })?;

        Ok(Self {
            client,
            url,
            flavor: config.flavor,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.retry.request_timeout,
        })
    }

    fn classify(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            return RemoteError::Timeout(self.timeout);
        }
        let mut msg = e.to_string();
        let mut source = e.source();
        while let Some(s) = source {
            msg.push_str(": ");
            msg.push_str(&s.to_string());
            source = s.source();
        }
        RemoteError::Transport(msg)
    }
}

#[async_trait]
impl VisionEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.url
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, RemoteError> {
        let body = build_body(self.flavor, &self.model, self.temperature, conversation)
            .map_err(|e| RemoteError::Malformed(format!("cannot serialise request: {e}")))?;

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let body: String = text.trim().chars().take(MAX_ERROR_BODY).collect();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("{}: HTTP {} ({} bytes)", self.url, status, text.len());
        parse_reply(self.flavor, &text)
    }
}

/// Send `conversation` under `policy`.
///
/// `on_failure` is invoked with the 1-based attempt number after every
/// failed attempt. Returns [`RemoteError::Exhausted`] once the attempt
/// budget is spent, or the first non-retryable error as-is.
pub async fn call_with_retry(
    endpoint: &dyn VisionEndpoint,
    conversation: &Conversation,
    policy: &RetryPolicy,
    mut on_failure: impl FnMut(u32, &RemoteError),
) -> Result<String, RemoteError> {
    let mut last_err: Option<RemoteError> = None;

    for attempt in 1..=policy.max_attempts {
        let result = match timeout(policy.request_timeout, endpoint.complete(conversation)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(policy.request_timeout)),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(
                    "{}: attempt {}/{} failed — {}",
                    endpoint.name(),
                    attempt,
                    policy.max_attempts,
                    e
                );
                on_failure(attempt, &e);

                if !e.is_retryable() {
                    return Err(e);
                }
                last_err = Some(e);

                if attempt < policy.max_attempts {
                    sleep(policy.retry_delay).await;
                }
            }
        }
    }

    Err(match last_err {
        Some(last) => RemoteError::Exhausted {
            attempts: policy.max_attempts,
            last: Box::new(last),
        },
        None => RemoteError::Transport("no attempts were made".into()),
    })
}

/// Both remote turns for one item.
#[derive(Debug, Clone)]
pub struct RemoteOutcome {
    /// First-turn transcription.
    pub initial: RemoteText,
    /// Refined transcription; `None` in single-step mode.
    pub refined: Option<RemoteText>,
}

/// Drives the one- or two-turn protocol for an item.
#[derive(Clone)]
pub struct RemoteClient {
    endpoint: Arc<dyn VisionEndpoint>,
    retry: RetryPolicy,
    ocr_hint: bool,
    progress: ProgressCallback,
}

impl RemoteClient {
    pub fn new(endpoint: Arc<dyn VisionEndpoint>, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            retry,
            ocr_hint: false,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Put the local OCR text into the first prompt as a reference.
    pub fn with_ocr_hint(mut self, v: bool) -> Self {
        self.ocr_hint = v;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Run the remote protocol for `item` under `mode`.
    ///
    /// Never fails: any unrecoverable error becomes an `Err` inside the
    /// outcome. In two-step mode a failed first turn skips the refinement
    /// call and is carried forward as the refined result too.
    pub async fn process(
        &self,
        item: &ImageItem,
        local_text: &str,
        mode: PipelineMode,
    ) -> RemoteOutcome {
        let image = match encode_file(&item.path).await {
            Ok(image) => image,
            Err(e) => {
                let err = RemoteError::ImageUnreadable(e.to_string());
                return RemoteOutcome {
                    initial: Err(err.clone()),
                    refined: (mode == PipelineMode::TwoStep).then_some(Err(err)),
                };
            }
        };

        let first = self.first_turn(image, local_text);
        let initial = self.send(item, &first).await;

        match mode {
            PipelineMode::SingleStep => RemoteOutcome {
                initial,
                refined: None,
            },
            PipelineMode::TwoStep => {
                let refined = match &initial {
                    Ok(text) => self.refine(item, first, text, local_text).await,
                    Err(e) => Err(e.clone()),
                };
                RemoteOutcome {
                    initial,
                    refined: Some(refined),
                }
            }
        }
    }

    /// Run only the refinement turn against a previously saved first answer.
    pub async fn refine_saved(
        &self,
        item: &ImageItem,
        local_text: &str,
        saved_initial: &str,
    ) -> RemoteText {
        let image = encode_file(&item.path)
            .await
            .map_err(|e| RemoteError::ImageUnreadable(e.to_string()))?;
        let first = self.first_turn(image, local_text);
        self.refine(item, first, saved_initial, local_text).await
    }

    fn first_turn(&self, image: EncodedImage, local_text: &str) -> Conversation {
        if self.ocr_hint {
            Conversation::with_image(transcribe_with_hint(local_text), image)
        } else {
            Conversation::with_image(TRANSCRIBE_PROMPT, image)
        }
    }

    async fn refine(
        &self,
        item: &ImageItem,
        first: Conversation,
        initial_text: &str,
        local_text: &str,
    ) -> RemoteText {
        let follow_up = first.reply(initial_text).ask(refine_prompt(local_text));
        self.send(item, &follow_up).await
    }

    async fn send(&self, item: &ImageItem, conversation: &Conversation) -> RemoteText {
        let max = self.retry.max_attempts;
        call_with_retry(self.endpoint.as_ref(), conversation, &self.retry, |attempt, e| {
            self.progress
                .on_attempt_failed(&item.file_name, attempt, max, &e.to_string());
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results and counts calls.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, RemoteError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, RemoteError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VisionEndpoint for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _c: &Conversation) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::Transport("script exhausted".into())))
        }
    }

    struct Hangs;

    #[async_trait]
    impl VisionEndpoint for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        async fn complete(&self, _c: &Conversation) -> Result<String, RemoteError> {
            sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            request_timeout: Duration::from_millis(50),
            retry_delay: Duration::from_millis(1),
        }
    }

    fn conv() -> Conversation {
        Conversation::default().ask("hello")
    }

    fn server_error() -> Result<String, RemoteError> {
        Err(RemoteError::Status {
            status: 500,
            body: "internal".into(),
        })
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let ep = Scripted::new(vec![server_error(), server_error(), Ok("text".into())]);
        let mut seen = Vec::new();
        let out = call_with_retry(&ep, &conv(), &fast_policy(3), |a, _| seen.push(a)).await;
        assert_eq!(out, Ok("text".into()));
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(ep.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_after_max_attempts() {
        let ep = Scripted::new(vec![server_error(), server_error(), server_error(), Ok("x".into())]);
        let out = call_with_retry(&ep, &conv(), &fast_policy(3), |_, _| {}).await;
        match out {
            Err(RemoteError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, RemoteError::Status { status: 500, .. }));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(ep.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_is_not_retried() {
        let ep = Scripted::new(vec![
            Err(RemoteError::Malformed("no content".into())),
            Ok("never reached".into()),
        ]);
        let out = call_with_retry(&ep, &conv(), &fast_policy(5), |_, _| {}).await;
        assert_eq!(out, Err(RemoteError::Malformed("no content".into())));
        assert_eq!(ep.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hanging_endpoint_times_out_each_attempt() {
        let mut attempts = 0;
        let out = call_with_retry(&Hangs, &conv(), &fast_policy(2), |_, e| {
            assert_eq!(*e, RemoteError::Timeout(Duration::from_millis(50)));
            attempts += 1;
        })
        .await;
        assert_eq!(attempts, 2);
        assert_eq!(
            out.unwrap_err().to_string(),
            "gave up after 2 attempts, last error: request timed out after 50ms"
        );
    }

    #[test]
    fn http_endpoint_rejects_bad_url() {
        let config = BatchConfig::builder()
            .endpoint_url("not a url")
            .build()
            .unwrap();
        assert!(HttpEndpoint::from_config(&config).is_err());
    }

    #[test]
    fn http_endpoint_joins_flavor_path() {
        let config = BatchConfig::builder()
            .flavor(ApiFlavor::OpenAi)
            .endpoint_url("http://127.0.0.1:1234/")
            .build()
            .unwrap();
        let ep = HttpEndpoint::from_config(&config).unwrap();
        assert_eq!(ep.name(), "http://127.0.0.1:1234/v1/chat/completions");
    }
}
