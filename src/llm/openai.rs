//! OpenAI 兼容 Chat Completions 客户端（Groq / OpenAI / 自建代理）
//!
//! 请求体用 async_openai 的类型构造，HTTP 调用走 reqwest：需要拿到原始状态码区分 429 与其他失败，
//! 而重试完全交给 RetryingLlmClient。

use std::time::Duration;

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::LlmSection;
use crate::llm::{GenerationRequest, LlmClient, LlmError, Message, Role};

/// 只取需要的字段，避免各家兼容端点的额外字段导致解析失败
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 兼容客户端：持有 HTTP client、端点与模型名
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        temperature: f32,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_config(section: &LlmSection, api_key: &str) -> Result<Self, LlmError> {
        Self::new(
            &section.base_url,
            &section.model,
            api_key,
            section.temperature,
            Duration::from_secs(section.request_timeout_secs),
        )
    }

    fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, LlmError> {
        let msg = match m.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| LlmError::InvalidRequest(e.to_string()))?,
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| LlmError::InvalidRequest(e.to_string()))?,
            ),
        };
        Ok(msg)
    }

    fn build_request(&self, request: &GenerationRequest) -> Result<CreateChatCompletionRequest, LlmError> {
        let messages = request
            .messages
            .iter()
            .map(Self::to_openai_message)
            .collect::<Result<Vec<_>, _>>()?;
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<String>, LlmError> {
        let body = self.build_request(request)?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message: String = text.chars().take(300).collect();
            return Err(LlmError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("invalid response body: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Purpose;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiClient::new(
            "https://api.groq.com/openai/v1/",
            "llama-3.3-70b-versatile",
            "key",
            0.8,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint,
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_carries_model_messages_and_temperature() {
        let client = OpenAiClient::new("http://localhost", "m", "k", 0.5, Duration::from_secs(5))
            .unwrap();
        let req = GenerationRequest::new(Purpose::Answer, "be bold", "what is art?");
        let body = serde_json::to_value(client.build_request(&req).unwrap()).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "what is art?");
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_response_tolerates_missing_content() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant"}}],"usage":{"total_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.choices[0].message.content.is_none());
    }
}
