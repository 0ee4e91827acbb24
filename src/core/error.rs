//! 游戏错误类型
//!
//! Validation / NotFound / State / Conflict 在任何生成调用之前检测并同步返回；
//! ExternalService 与 Cancelled 可能发生在回合中途，两者都会丢弃整个回合（不做部分持久化）。

use thiserror::Error;

use crate::llm::LlmError;

/// 回合编排与游戏存储过程中可能出现的错误
#[derive(Error, Debug)]
pub enum GameError {
    /// 空问题、无活跃 Agent 等输入错误
    #[error("{0}")]
    Validation(String),

    #[error("game not found: {0}")]
    NotFound(String),

    /// 对已结束的游戏发起操作
    #[error("{0}")]
    State(String),

    /// 同一游戏已有进行中的回合，或存储版本已过期
    #[error("{0}")]
    Conflict(String),

    /// 生成后端返回不可重试状态、重试耗尽或结构化输出无法解析
    #[error("external service error: {0}")]
    ExternalService(#[source] LlmError),

    /// 截止时间已到或调用方断开
    #[error("round cancelled: {0}")]
    Cancelled(String),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// 错误类别名（日志与 HTTP 响应使用）
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "validation",
            GameError::NotFound(_) => "not_found",
            GameError::State(_) => "state",
            GameError::Conflict(_) => "conflict",
            GameError::ExternalService(_) => "external_service",
            GameError::Cancelled(_) => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GameError::Cancelled(_))
    }
}

impl From<LlmError> for GameError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => GameError::Cancelled("generation aborted".to_string()),
            other => GameError::ExternalService(other),
        }
    }
}
