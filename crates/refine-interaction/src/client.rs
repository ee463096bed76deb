use crate::backoff::BackoffPolicy;
use crate::cache::{CacheKey, ResponseCache};
use crate::chat::{self, ChatCompletionRequest};
use crate::config::ClientConfig;
use crate::transport::{CompletionTransport, ReqwestTransport, TransportError};
use refine_core::config::Settings;
use refine_core::protocol::ImproveResult;
use refine_core::{ErrorReport, ErrorType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Remote Call Client: validation, cache, retry with backoff, per-attempt timeout.
///
/// Every failure comes back as an [`ErrorReport`] so callers can forward it
/// as an ordinary payload.
#[derive(Clone)]
pub struct RewriteClient {
    transport: Arc<dyn CompletionTransport>,
    config: ClientConfig,
    backoff: BackoffPolicy,
    cache: ResponseCache,
}

impl RewriteClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, config: ClientConfig) -> Self {
        let backoff = BackoffPolicy::new(
            config.backoff_base,
            config.backoff_cap,
            config.max_jitter,
        );
        let cache = ResponseCache::new(config.cache_capacity, config.cache_ttl);
        Self {
            transport,
            config,
            backoff,
            cache,
        }
    }

    /// Client over HTTP to `config.endpoint`.
    pub fn over_http(config: ClientConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.endpoint.clone()));
        Self::new(transport, config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Rewrites `text` with the model and prompt from `settings`.
    ///
    /// Cancelling `cancel` aborts the in-flight attempt or backoff sleep and
    /// resolves to a `cancelled` report.
    pub async fn call(
        &self,
        text: &str,
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> Result<ImproveResult, ErrorReport> {
        self.run(text, settings, cancel, true).await
    }

    /// Like [`call`](Self::call) but skips the cache lookup, so the user gets a
    /// new rewrite. The fresh result still replaces the cached one.
    pub async fn regenerate(
        &self,
        text: &str,
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> Result<ImproveResult, ErrorReport> {
        self.run(text, settings, cancel, false).await
    }

    async fn run(
        &self,
        text: &str,
        settings: &Settings,
        cancel: &CancellationToken,
        use_cache: bool,
    ) -> Result<ImproveResult, ErrorReport> {
        let started = Instant::now();

        let api_key = settings.api_key().ok_or_else(|| {
            ErrorReport::new(
                ErrorType::Auth,
                "No API key configured. Add one in the Refine settings.",
            )
        })?;
        let text = self.validate_text(text)?;

        let model = self.config.resolve_model(&settings.model);
        let key = CacheKey::new(text, &model, &settings.system_prompt);
        let hit = if use_cache { self.cache.get(&key).await } else { None };
        if let Some(result) = hit {
            tracing::debug!("[RewriteClient] Cache hit for {} chars", text.chars().count());
            return Ok(ImproveResult {
                text: result,
                latency_ms: elapsed_ms(started),
                cached: true,
            });
        }

        let request = ChatCompletionRequest::rewrite(&model, &settings.system_prompt, text);
        let mut last_error = None;
        let mut retry_hint: Option<Duration> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay(attempt - 1, retry_hint.take());
                tracing::debug!(
                    "[RewriteClient] Retry {}/{} in {:?}",
                    attempt,
                    self.config.max_retries,
                    delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                outcome = tokio::time::timeout(
                    self.config.attempt_timeout,
                    self.transport.send(api_key, &request),
                ) => outcome,
            };

            let report = match outcome {
                Err(_) | Ok(Err(TransportError::Timeout)) => ErrorReport::new(
                    ErrorType::Timeout,
                    format!(
                        "The rewrite service did not answer within {} seconds.",
                        self.config.attempt_timeout.as_secs()
                    ),
                ),
                Ok(Err(TransportError::Network(message))) => ErrorReport::new(
                    ErrorType::Network,
                    format!("Could not reach the rewrite service: {message}"),
                ),
                Ok(Ok(reply)) if reply.is_success() => {
                    let result = chat::extract_text_response(&reply.body)?;
                    self.cache.insert(key, result.clone()).await;
                    let latency_ms = elapsed_ms(started);
                    tracing::info!(
                        "[RewriteClient] Rewrite completed in {}ms after {} attempt(s)",
                        latency_ms,
                        attempt + 1
                    );
                    return Ok(ImproveResult {
                        text: result,
                        latency_ms,
                        cached: false,
                    });
                }
                Ok(Ok(reply)) => {
                    let report = chat::map_http_error(reply.status, &reply.body);
                    if !chat::is_retryable_status(reply.status) {
                        return Err(report);
                    }
                    retry_hint = reply.retry_after;
                    report
                }
            };

            tracing::warn!(
                "[RewriteClient] Attempt {}/{} failed: {}",
                attempt + 1,
                self.config.total_attempts(),
                report
            );
            last_error = Some(report);
        }

        Err(last_error.unwrap_or_else(|| {
            ErrorReport::new(ErrorType::Unknown, "The rewrite request failed.")
        }))
    }

    fn validate_text<'a>(&self, text: &'a str) -> Result<&'a str, ErrorReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ErrorReport::new(
                ErrorType::Validation,
                "There is no text to rewrite.",
            ));
        }
        let chars = text.chars().count();
        if chars > self.config.max_text_chars {
            return Err(ErrorReport::new(
                ErrorType::Validation,
                format!(
                    "The selection is too long ({chars} characters, limit {}).",
                    self.config.max_text_chars
                ),
            ));
        }
        Ok(text)
    }

    /// A server `Retry-After` may stretch the delay, never past the cap.
    fn retry_delay(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let delay = self.backoff.delay(retry);
        match hint {
            Some(hint) => delay.max(hint.min(self.backoff.cap)),
            None => delay,
        }
    }
}

fn cancelled() -> ErrorReport {
    ErrorReport::new(ErrorType::Cancelled, "The request was superseded.")
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
