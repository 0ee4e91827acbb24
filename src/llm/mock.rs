//! Mock 生成后端
//!
//! - MockLlmClient：无 API Key 时的本地后端，回复固定文本；投票回复空目标，由引擎的确定性兜底规则选人
//! - ScriptedLlmClient：测试替身，按闭包生成回复并记录每一次请求

use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GenerationRequest, LlmClient, LlmError, Purpose};

/// 本地 Mock：不访问网络，便于无 Key 跑通整局游戏
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<String>, LlmError> {
        let agent = request.agent_id.as_deref().unwrap_or("judge");
        let text = match request.purpose {
            Purpose::Answer => format!(
                "{agent}: Honestly? Whoever says it depends is dodging the question. I pick a side and own it."
            ),
            Purpose::Debate => format!(
                "{agent}: With all due respect, the rest of you are hedging. Name one concrete example."
            ),
            Purpose::Vote | Purpose::Judge => {
                r#"{"vote_for": "", "justification": "Mock backend has no opinion."}"#.to_string()
            }
        };
        Ok(vec![text])
    }
}

type ChoicesHandler = dyn Fn(&GenerationRequest) -> Result<Vec<String>, LlmError> + Send + Sync;

/// 测试替身：闭包决定回复，记录调用次数与请求内容
pub struct ScriptedLlmClient {
    handler: Box<ChoicesHandler>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlmClient {
    /// 闭包返回单条文本回复
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self::with_choices(move |req| handler(req).map(|text| vec![text]))
    }

    /// 闭包返回完整的候选列表（可为空，用于模拟“无结果”）
    pub fn with_choices<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Vec<String>, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.lock_requests().clone()
    }

    /// 某一用途的调用次数
    pub fn calls_for(&self, purpose: Purpose) -> usize {
        self.lock_requests()
            .iter()
            .filter(|r| r.purpose == purpose)
            .count()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<GenerationRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<String>, LlmError> {
        self.lock_requests().push(request.clone());
        (self.handler)(request)
    }
}
