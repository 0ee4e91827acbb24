//! Arena - AI 淘汰赛回合编排
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **observability**: tracing 订阅器初始化
//! - **core**: 错误类型、优雅关闭
//! - **game**: 数据模型与游戏创建
//! - **store**: 游戏存储抽象与内存实现（乐观版本号）
//! - **llm**: 生成后端抽象与实现（OpenAI 兼容 / Mock）、重试与结构化输出解析
//! - **round**: 回合引擎（回答 → 辩论 → 投票 → 判罚）、观察者、裁判
//! - **delivery**: 批量 / 流式交付、SSE 帧、每游戏回合锁
//! - **server**: axum HTTP 接口（feature `web`）

pub mod config;
pub mod core;
pub mod delivery;
pub mod game;
pub mod llm;
pub mod observability;
pub mod round;
#[cfg(feature = "web")]
pub mod server;
pub mod store;

pub use crate::core::GameError;
pub use delivery::{RoundService, RoundStream, StreamEvent};
pub use game::{Game, GameStatus, Round};
pub use round::{RoundEngine, RoundOutcome};
