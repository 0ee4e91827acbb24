//! 生成层：后端抽象与实现（OpenAI 兼容 / Mock / Scripted）、重试策略、结构化输出解析

pub mod json;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod traits;

use std::sync::Arc;

pub use json::{decode_structured, strip_code_fence};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use retry::{cancellable_sleep, RetryConfig, RetryingLlmClient};
pub use traits::{GenerationRequest, LlmClient, LlmError, Message, Purpose, Role};

use crate::config::{resolve_api_key, AppConfig};

/// 根据配置与环境变量选择生成后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (provider = mock)");
        return Arc::new(MockLlmClient);
    }

    let Some(api_key) = resolve_api_key() else {
        tracing::warn!("No API key set (GROQ_KEY / GROQ_API_KEY / OPENAI_API_KEY), using Mock LLM");
        return Arc::new(MockLlmClient);
    };

    match OpenAiClient::from_config(&cfg.llm, &api_key) {
        Ok(client) => {
            tracing::info!(
                "Using {} LLM ({}) at {}",
                provider,
                cfg.llm.model,
                cfg.llm.base_url
            );
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!("Failed to build HTTP client ({}), using Mock LLM", e);
            Arc::new(MockLlmClient)
        }
    }
}

/// 带重试的生成客户端（重试参数来自 [llm.retry]）
pub fn create_generation_client(cfg: &AppConfig) -> RetryingLlmClient {
    RetryingLlmClient::new(create_llm_from_config(cfg), RetryConfig::from(&cfg.llm.retry))
}
