//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ARENA__*` 覆盖（双下划线表示嵌套，如 `ARENA__LLM__MODEL=llama-3.1-8b-instant`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::RetryConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub game: GameSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、模型、采样温度与单次请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：groq / openai / mock；无 API Key 时一律退化为 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySection,
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetrySection::default(),
        }
    }
}

/// [llm.retry] 段：限流重试与指数退避
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig {
            max_retries: section.max_retries,
            base_delay: Duration::from_millis(section.base_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
        }
    }
}

/// 平局处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakMode {
    /// 所有票数最少的 Agent 都吃 strike
    #[default]
    StrikeAll,
    /// 多人并列最少时由裁判 LLM 选出一人
    Judge,
}

/// [game] 段：创建游戏的默认值与回合参数
#[derive(Debug, Clone, Deserialize)]
pub struct GameSection {
    #[serde(default = "default_agents")]
    pub default_agents: usize,
    #[serde(default = "default_max_strikes")]
    pub default_max_strikes: u32,
    /// 单局 Agent 数上限，超过时拒绝创建
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// 每回合辩论轮数
    #[serde(default = "default_debate_turns")]
    pub debate_turns: u32,
    #[serde(default)]
    pub tie_break: TieBreakMode,
}

fn default_agents() -> usize {
    4
}

fn default_max_strikes() -> u32 {
    2
}

fn default_max_agents() -> usize {
    16
}

fn default_debate_turns() -> u32 {
    2
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            default_agents: default_agents(),
            default_max_strikes: default_max_strikes(),
            max_agents: default_max_agents(),
            debate_turns: default_debate_turns(),
            tie_break: TieBreakMode::default(),
        }
    }
}

/// [server] 段：监听地址与回合截止时间
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 非流式回合的整体截止时间（秒）
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,
    /// 流式回合的整体截止时间（秒），比非流式宽松
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_round_timeout_secs() -> u64 {
    120
}

fn default_stream_timeout_secs() -> u64 {
    180
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            round_timeout_secs: default_round_timeout_secs(),
            stream_timeout_secs: default_stream_timeout_secs(),
        }
    }
}

impl ServerSection {
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

/// 按 GROQ_KEY → GROQ_API_KEY → OPENAI_API_KEY 顺序查找 API Key
pub fn resolve_api_key() -> Option<String> {
    ["GROQ_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

/// 从 config 目录加载配置，环境变量 ARENA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ARENA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ARENA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
