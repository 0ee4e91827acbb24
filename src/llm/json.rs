//! 结构化输出解析：LLM 偶尔会把 JSON 包在 ```json ... ``` 代码块里

use serde::de::DeserializeOwned;

use crate::llm::LlmError;

/// 去掉首尾空白以及开头的 ```json / ``` 与结尾的 ```
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// 剥离代码块后按 JSON 解析；失败时错误信息附带原始片段便于排查
pub fn decode_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        let preview: String = cleaned.chars().take(200).collect();
        LlmError::Decode(format!("{e} (raw={preview})"))
    })
}
