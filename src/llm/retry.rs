//! 弹性生成客户端：有界重试 + 指数退避 + 可取消等待
//!
//! - 第 0 次尝试立即执行；之后每次重试前等待 base_delay * 2^(n-1)，上限 max_delay
//! - 限流、网络错误、空回复可重试；其他非成功状态立即失败
//! - 等待与调用本身都可被 CancellationToken 打断，打断后不再尝试
//!
//! 回合引擎自身从不重试，所有重试逻辑都集中在这里。

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::llm::json::decode_structured;
use crate::llm::{GenerationRequest, LlmClient, LlmError};

/// 重试策略：可重试判定与每次尝试前的等待时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retryable(&self, err: &LlmError) -> bool {
        matches!(
            err,
            LlmError::RateLimited | LlmError::Transport(_) | LlmError::EmptyResponse
        )
    }

    /// 第 attempt 次尝试（从 0 开始）之前的等待时长
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 可取消的等待；取消时返回 LlmError::Cancelled
pub async fn cancellable_sleep(delay: Duration, cancel: &CancellationToken) -> Result<(), LlmError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// 包装任意 LlmClient 的弹性客户端
#[derive(Clone)]
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// 自由文本生成：返回第一个候选回复
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let max_attempts = self.config.max_attempts();
        let mut last_err = LlmError::EmptyResponse;

        for attempt in 0..max_attempts {
            let delay = self.config.delay_for_attempt(attempt);
            if !delay.is_zero() {
                cancellable_sleep(delay, cancel).await?;
            }
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                r = self.inner.complete(request) => r,
            };

            let err = match result {
                Ok(choices) => match choices.into_iter().next() {
                    Some(text) => return Ok(text),
                    None => LlmError::EmptyResponse,
                },
                Err(e) => e,
            };

            if !self.config.is_retryable(&err) {
                tracing::warn!(
                    backend = self.inner.name(),
                    purpose = request.purpose.as_str(),
                    agent = request.agent_id.as_deref().unwrap_or("-"),
                    "generation failed without retry: {}",
                    err
                );
                return Err(err);
            }

            tracing::warn!(
                backend = self.inner.name(),
                purpose = request.purpose.as_str(),
                agent = request.agent_id.as_deref().unwrap_or("-"),
                attempt = attempt + 1,
                max_attempts,
                next_delay_ms = self.config.delay_for_attempt(attempt + 1).as_millis() as u64,
                "generation attempt failed: {}",
                err
            );
            last_err = err;
        }

        tracing::error!(
            purpose = request.purpose.as_str(),
            attempts = max_attempts,
            "generation retries exhausted"
        );
        Err(LlmError::RetriesExhausted {
            attempts: max_attempts,
            source: Box::new(last_err),
        })
    }

    /// 结构化生成：先取文本，再剥离代码块围栏并解析 JSON；解析失败不重试
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<T, LlmError> {
        let raw = self.generate(request, cancel).await?;
        decode_structured(&raw)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::llm::{Purpose, ScriptedLlmClient};

    fn request() -> GenerationRequest {
        GenerationRequest::new(Purpose::Answer, "sys", "usr").for_agent("agent-1")
    }

    /// 前 n 次返回 err，之后返回 "ok"
    fn failing_then_ok(n: u32, err: LlmError) -> Arc<ScriptedLlmClient> {
        let calls = AtomicU32::new(0);
        Arc::new(ScriptedLlmClient::new(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < n {
                Err(err.clone())
            } else {
                Ok("ok".to_string())
            }
        }))
    }

    #[test]
    fn test_delay_schedule_doubles_and_caps() {
        let cfg = RetryConfig::default();
        let delays: Vec<u64> = (0..8).map(|n| cfg.delay_for_attempt(n).as_secs()).collect();
        assert_eq!(delays, vec![0, 1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(cfg.delay_for_attempt(200), Duration::from_secs(30));
    }

    #[test]
    fn test_retryable_classification() {
        let cfg = RetryConfig::default();
        assert!(cfg.is_retryable(&LlmError::RateLimited));
        assert!(cfg.is_retryable(&LlmError::Transport("reset".into())));
        assert!(cfg.is_retryable(&LlmError::EmptyResponse));
        assert!(!cfg.is_retryable(&LlmError::Status {
            status: 401,
            message: "unauthorized".into()
        }));
        assert!(!cfg.is_retryable(&LlmError::Decode("bad".into())));
        assert!(!cfg.is_retryable(&LlmError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_then_success_waits_sum_of_backoff() {
        let llm = failing_then_ok(5, LlmError::RateLimited);
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());

        let start = tokio::time::Instant::now();
        let text = client
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(text, "ok");
        assert_eq!(llm.call_count(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4 + 8 + 16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_wait_three_seconds() {
        let llm = failing_then_ok(2, LlmError::RateLimited);
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());

        let start = tokio::time::Instant::now();
        client
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(llm.call_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_status_fails_after_one_attempt() {
        let llm = failing_then_ok(
            10,
            LlmError::Status {
                status: 500,
                message: "internal".into(),
            },
        );
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());

        let start = tokio::time::Instant::now();
        let err = client
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Status { status: 500, .. }));
        assert_eq!(llm.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let llm = failing_then_ok(u32::MAX, LlmError::RateLimited);
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());

        let start = tokio::time::Instant::now();
        let err = client
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LlmError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 6);
                assert!(matches!(*source, LlmError::RateLimited));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(llm.call_count(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_choices_are_retried() {
        let calls = AtomicU32::new(0);
        let llm = Arc::new(ScriptedLlmClient::with_choices(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Vec::new())
            } else {
                Ok(vec!["second".to_string(), "ignored".to_string()])
            }
        }));
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());

        let text = client
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "second");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let llm = failing_then_ok(u32::MAX, LlmError::RateLimited);
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = client.generate(&request(), &cancel).await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert_eq!(llm.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_call() {
        let llm = failing_then_ok(0, LlmError::RateLimited);
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.generate(&request(), &cancel).await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert_eq!(llm.call_count(), 0);
    }

    #[derive(Debug, Deserialize)]
    struct Pick {
        vote_for: String,
    }

    #[tokio::test]
    async fn test_structured_strips_fence() {
        let llm = Arc::new(ScriptedLlmClient::new(|_| {
            Ok("```json\n{\"vote_for\": \"agent-3\"}\n```".to_string())
        }));
        let client = RetryingLlmClient::new(llm, RetryConfig::default());
        let pick: Pick = client
            .generate_structured(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(pick.vote_for, "agent-3");
    }

    #[tokio::test]
    async fn test_structured_decode_failure_is_not_retried() {
        let llm = Arc::new(ScriptedLlmClient::new(|_| Ok("I refuse to vote".to_string())));
        let client = RetryingLlmClient::new(llm.clone(), RetryConfig::default());
        let err = client
            .generate_structured::<Pick>(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
        assert_eq!(llm.call_count(), 1);
    }
}
