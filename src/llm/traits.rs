//! 生成后端抽象
//!
//! 所有后端（OpenAI 兼容 HTTP / Mock / Scripted）实现 LlmClient：一次调用返回全部候选回复（choices）。
//! 重试、退避与取消不在这里处理，统一由 [`crate::llm::RetryingLlmClient`] 负责。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 调用目的：回答 / 辩论为自由文本，投票 / 裁判为结构化 JSON
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    Answer,
    Debate,
    Vote,
    Judge,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Answer => "answer",
            Purpose::Debate => "debate",
            Purpose::Vote => "vote",
            Purpose::Judge => "judge",
        }
    }
}

/// 一次生成请求：system + user 消息，附带目的与发言 Agent（仅用于日志与测试替身）
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub purpose: Purpose,
    pub agent_id: Option<String>,
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    pub fn new(purpose: Purpose, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            agent_id: None,
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn system_prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// 生成后端错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// 后端限流（HTTP 429），可重试
    #[error("rate limited (429)")]
    RateLimited,

    /// 其他非成功状态，不重试
    #[error("generation backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// 网络 / 响应体读取失败，可重试
    #[error("transport error: {0}")]
    Transport(String),

    /// 响应中没有任何候选回复，可重试
    #[error("no result returned")]
    EmptyResponse,

    /// 请求无法构造（模型名、参数非法），不重试
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// 结构化输出（JSON）解析失败，不重试
    #[error("failed to decode structured output: {0}")]
    Decode(String),

    #[error("cancelled")]
    Cancelled,

    #[error("max retries exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<LlmError>,
    },
}

/// 生成后端 trait：单次调用，不含重试
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 返回所有候选回复；空列表由调用方视为失败
    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<String>, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_prompts() {
        let req = GenerationRequest::new(Purpose::Vote, "sys", "usr").for_agent("agent-2");
        assert_eq!(req.system_prompt(), "sys");
        assert_eq!(req.user_prompt(), "usr");
        assert_eq!(req.agent_id.as_deref(), Some("agent-2"));
        assert_eq!(req.purpose.as_str(), "vote");
    }

    #[test]
    fn test_exhausted_error_mentions_last_cause() {
        let err = LlmError::RetriesExhausted {
            attempts: 6,
            source: Box::new(LlmError::RateLimited),
        };
        let text = err.to_string();
        assert!(text.contains("6 attempts"));
        assert!(text.contains("429"));
    }
}
