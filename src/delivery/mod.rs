//! 交付层：批量 / 流式两种前端、SSE 帧编码、每游戏回合锁

pub mod locks;
pub mod service;
pub mod sse;

pub use locks::{RoundLocks, RoundPermit};
pub use service::{RoundService, RoundStream};
pub use sse::StreamEvent;
