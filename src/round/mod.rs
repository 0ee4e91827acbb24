//! 回合编排：提示词、观察者、阶段状态机、判罚与裁判

pub mod engine;
pub mod judge;
pub mod observer;
pub mod prompts;
pub mod resolution;

pub use engine::{RoundEngine, RoundOutcome, FALLBACK_JUSTIFICATION};
pub use judge::LlmJudge;
pub use observer::{NoopObserver, PhaseMarker, PhasePayload, RoundEvent, RoundObserver};
pub use resolution::{StrikePolicy, TieBreaker};
