//! Inference client: opens streams, runs non-streaming completions, and owns
//! the pooled HTTP connections.
//!
//! # Responsibilities
//! - Build and send OpenAI-compatible chat-completion requests
//! - Surface pre-stream failures as classified errors
//! - Run one reader task per stream that feeds the decoder and pushes events
//!   through a bounded channel
//! - Cancel, drain and tear down everything on shutdown
//!
//! # Design Decisions
//! - Each stream gets a child of the client's root token, so cancelling one
//!   stream never touches another while shutdown reaches all of them
//! - The reader checks cancellation on every read and every send, which
//!   bounds the time to stop at one read cycle
//! - A read error after the stream opened is logged and treated as an abrupt
//!   close; the caller still gets the final accumulated text

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::StreamingConfig;
use crate::diagnostics::{classify, ClassifiedError, ErrorContext};
use crate::observability::metrics;
use crate::selection::Target;
use crate::streaming::active::ActiveStreams;
use crate::streaming::decoder::SseDecoder;
use crate::streaming::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatRequest, Completion, StreamEvent,
};

/// Longest error body excerpt carried into a classified error.
const ERROR_BODY_LIMIT: usize = 512;

pub struct InferenceClient {
    http: RwLock<Option<reqwest::Client>>,
    config: StreamingConfig,
    streams: Arc<ActiveStreams>,
    root: CancellationToken,
}

impl InferenceClient {
    pub fn new(config: &StreamingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("inference-router/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http: RwLock::new(Some(http)),
            config: config.clone(),
            streams: Arc::new(ActiveStreams::new()),
            root: CancellationToken::new(),
        })
    }

    pub fn active_stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn active_streams(&self) -> &ActiveStreams {
        &self.streams
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Open a streaming completion against `target`.
    ///
    /// Connection failures and non-2xx responses are returned as classified
    /// errors; nothing is emitted for them.
    pub async fn open_stream(&self, target: &Target, request: &ChatRequest) -> Result<ChatStream, ClassifiedError> {
        let url = target.completions_url();
        let http = self.http_client(&url)?;
        let body = self.build_body(target, request, true);

        let send = authorized(http.post(&url), target)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send();
        // Headers must arrive within the request timeout; the body may stream longer.
        let response = match time::timeout(self.request_timeout(), send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.fail(ClassifiedError::from_reqwest(&e, &url), target)),
            Err(_) => {
                let message = format!("timeout waiting for response headers after {:?}", self.request_timeout());
                return Err(self.fail(classify(&message, &ErrorContext::for_url(&url)), target));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let excerpt = error_excerpt(response).await;
            let message = format!("HTTP {}: {}", status.as_u16(), excerpt);
            let context = ErrorContext::for_url(&url).with_status(status.as_u16());
            return Err(self.fail(classify(&message, &context), target));
        }

        let token = self.root.child_token();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let stream_id = self.streams.register(&target.server_id, token.clone());

        tracing::info!(server = %target.server_id, stream_id, model = %target.model, "Stream opened");

        let reader = StreamReader {
            stream_id,
            server_id: target.server_id.clone(),
            url,
            token: token.clone(),
            tx,
            streams: Arc::clone(&self.streams),
        };
        self.streams.tracker().spawn(reader.run(response.bytes_stream()));

        Ok(ChatStream {
            rx,
            token,
            server_id: target.server_id.clone(),
            finished: false,
        })
    }

    /// Run a non-streaming completion against `target`.
    pub async fn complete(&self, target: &Target, request: &ChatRequest) -> Result<Completion, ClassifiedError> {
        let url = target.completions_url();
        let http = self.http_client(&url)?;
        let body = self.build_body(target, request, false);

        let response = authorized(http.post(&url), target)
            .timeout(self.request_timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.fail(ClassifiedError::from_reqwest(&e, &url), target))?;

        let status = response.status();
        if !status.is_success() {
            let excerpt = error_excerpt(response).await;
            let message = format!("HTTP {}: {}", status.as_u16(), excerpt);
            let context = ErrorContext::for_url(&url).with_status(status.as_u16());
            return Err(self.fail(classify(&message, &context), target));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| self.fail(ClassifiedError::from_reqwest(&e, &url), target))?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&raw).map_err(|e| {
            let message = format!("invalid JSON in completion response: {e}");
            self.fail(classify(&message, &ErrorContext::for_url(&url)), target)
        })?;

        let usage = parsed.usage.unwrap_or_default();
        let choice = parsed.choices.into_iter().next();
        Ok(Completion {
            content: choice
                .as_ref()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            finish_reason: choice.and_then(|c| c.finish_reason),
            usage,
        })
    }

    /// Cancel every open stream and wait for their readers to exit.
    ///
    /// The client stays usable afterwards.
    pub async fn cancel_all(&self) -> usize {
        let cancelled = self.streams.cancel_and_drain().await;
        tracing::info!(cancelled, "All streams cancelled");
        cancelled
    }

    /// Cancel all streams, drain their readers, and drop the connection pool.
    ///
    /// Later requests fail with a configuration error.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let cancelled = self.streams.cancel_and_drain().await;
        let dropped = self.http.write().take().is_some();
        tracing::info!(cancelled, pool_released = dropped, "Inference client shut down");
    }

    fn http_client(&self, url: &str) -> Result<reqwest::Client, ClassifiedError> {
        if self.root.is_cancelled() {
            return Err(ClassifiedError::configuration(
                "inference client has been shut down",
                &ErrorContext::for_url(url),
            ));
        }
        self.http.read().clone().ok_or_else(|| {
            ClassifiedError::configuration("inference client has been shut down", &ErrorContext::for_url(url))
        })
    }

    fn build_body(&self, target: &Target, request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
        let requested = request.max_tokens.unwrap_or(self.config.max_tokens);
        let max_tokens = match target.max_tokens {
            Some(limit) => requested.min(limit),
            None => requested,
        };
        ChatCompletionRequest {
            model: target.model.clone(),
            messages: request.messages.clone(),
            max_tokens,
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            stream,
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    fn fail(&self, error: ClassifiedError, target: &Target) -> ClassifiedError {
        tracing::warn!(
            server = %target.server_id,
            kind = %error.kind,
            status = ?error.status_code,
            error = %error.message,
            "Inference request failed"
        );
        metrics::record_stream_error(error.kind);
        error
    }
}

fn authorized(builder: reqwest::RequestBuilder, target: &Target) -> reqwest::RequestBuilder {
    match &target.api_key {
        Some(key) => builder.header(AUTHORIZATION, format!("Bearer {key}")),
        None => builder,
    }
}

async fn error_excerpt(response: reqwest::Response) -> String {
    let reason = response.status().canonical_reason().unwrap_or("").to_string();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        return reason;
    }
    let mut excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    if excerpt.len() < body.len() {
        excerpt.push('…');
    }
    excerpt
}

/// Background half of a stream: reads the body and feeds the decoder.
struct StreamReader {
    stream_id: u64,
    server_id: String,
    url: String,
    token: CancellationToken,
    tx: mpsc::Sender<StreamEvent>,
    streams: Arc<ActiveStreams>,
}

impl StreamReader {
    async fn run<S, B>(self, body: S)
    where
        S: Stream<Item = Result<B, reqwest::Error>>,
        B: AsRef<[u8]>,
    {
        let mut body = std::pin::pin!(body);
        let mut decoder = SseDecoder::new();

        let completed = loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => break false,
                next = body.next() => next,
            };

            let events = match next {
                Some(Ok(bytes)) => decoder.feed(bytes.as_ref()),
                Some(Err(e)) => {
                    let error = ClassifiedError::from_reqwest(&e, &self.url);
                    tracing::warn!(
                        server = %self.server_id,
                        stream_id = self.stream_id,
                        kind = %error.kind,
                        error = %error.message,
                        "Stream read failed, closing"
                    );
                    metrics::record_stream_error(error.kind);
                    decoder.finish()
                }
                None => decoder.finish(),
            };

            if !self.forward(events).await {
                break false;
            }
            if decoder.is_finished() {
                break true;
            }
        };

        self.streams.deregister(self.stream_id);
        if completed {
            tracing::info!(
                server = %self.server_id,
                stream_id = self.stream_id,
                chars = decoder.char_count(),
                "Stream completed"
            );
        } else {
            tracing::info!(server = %self.server_id, stream_id = self.stream_id, "Stream cancelled");
        }
    }

    /// Push events to the consumer. `false` once cancelled or abandoned.
    async fn forward(&self, events: Vec<StreamEvent>) -> bool {
        for event in events {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return false,
                sent = self.tx.send(event) => {
                    if sent.is_err() {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Consumer half of a stream.
///
/// Yields deltas and then exactly one final event. Returns `None` as soon as
/// cancellation is observed. Dropping the stream cancels it.
#[derive(Debug)]
pub struct ChatStream {
    rx: mpsc::Receiver<StreamEvent>,
    token: CancellationToken,
    server_id: String,
    finished: bool,
}

impl ChatStream {
    /// Server this stream is reading from.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Handle that cancels this stream only.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drain the stream and return the final event, if it was reached.
    pub async fn into_final(mut self) -> Option<StreamEvent> {
        while let Some(event) = self.next().await {
            if event.is_final() {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for ChatStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished || this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if this.token.is_cancelled() {
                    return Poll::Ready(None);
                }
                this.finished = event.is_final();
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
