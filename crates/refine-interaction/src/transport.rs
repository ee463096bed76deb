//! HTTP seam for the rewrite call.
//!
//! [`RewriteClient`](crate::RewriteClient) talks to a [`CompletionTransport`]
//! so retries, timeouts and caching can be exercised against
//! [`ScriptedTransport`] without a network.

use crate::chat::ChatCompletionRequest;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// A completed HTTP exchange, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any HTTP status was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<HttpReply, TransportError>;
}

/// Production transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CompletionTransport for ReqwestTransport {
    async fn send(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(err.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers().get("retry-after"));
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(format!("failed to read response body: {err}"))
            }
        })?;

        Ok(HttpReply {
            status,
            body,
            retry_after,
        })
    }
}

/// Seconds form only; an HTTP-date is ignored.
pub(crate) fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// One scripted outcome for [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(HttpReply),
    NetworkError(String),
    /// Answers after `delay`.
    Delayed { delay: Duration, reply: HttpReply },
    /// Never completes; only a timeout or cancellation ends the attempt.
    Hang,
}

impl ScriptStep {
    pub fn ok(content: &str) -> Self {
        Self::Reply(completion(content))
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Reply(HttpReply::new(status, body))
    }

    pub fn ok_after(delay: Duration, content: &str) -> Self {
        Self::Delayed {
            delay,
            reply: completion(content),
        }
    }
}

fn completion(content: &str) -> HttpReply {
    let body = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    });
    HttpReply::new(200, body.to_string())
}

/// A call observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub api_key: String,
    pub model: String,
    pub text: String,
}

/// Replays a fixed list of outcomes; the final step repeats once the list is
/// exhausted.
#[derive(Clone)]
pub struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<ScriptStep>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers with `content`.
    pub fn replying(content: &str) -> Self {
        Self::new([ScriptStep::ok(content)])
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    fn next_step(&self) -> ScriptStep {
        let Ok(mut steps) = self.steps.lock() else {
            return ScriptStep::NetworkError("script poisoned".to_string());
        };
        if steps.len() > 1 {
            steps.pop_front().unwrap_or(ScriptStep::Hang)
        } else {
            steps
                .front()
                .cloned()
                .unwrap_or_else(|| ScriptStep::NetworkError("script is empty".to_string()))
        }
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn send(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<HttpReply, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                at: Instant::now(),
                api_key: api_key.to_string(),
                model: request.model.clone(),
                text: request.user_text().to_string(),
            });
        }

        match self.next_step() {
            ScriptStep::Reply(reply) => Ok(reply),
            ScriptStep::NetworkError(message) => Err(TransportError::Network(message)),
            ScriptStep::Delayed { delay, reply } => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            ScriptStep::Hang => std::future::pending().await,
        }
    }
}
