//! 回合观察者：每产生一个产物（回答 / 辩论 / 投票 / 裁决）或阶段结束时被调用
//!
//! 批量模式使用 NoopObserver；流式模式把事件转成 SSE 帧推给客户端。

use serde::Serialize;

use crate::game::{Answer, DebateMessage, JudgeVerdict, Vote};

/// 阶段边界
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseMarker {
    AnswersDone,
    DebateDone,
}

impl PhaseMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseMarker::AnswersDone => "answers_done",
            PhaseMarker::DebateDone => "debate_done",
        }
    }
}

/// phase 事件的负载：{"phase":"answers_done"}
#[derive(Debug, Serialize)]
pub struct PhasePayload {
    pub phase: &'static str,
}

/// 回合过程事件，按 (阶段, 辩论轮次, 活跃 Agent 顺序) 全序产生
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundEvent {
    Answer(Answer),
    Phase(PhaseMarker),
    Debate(DebateMessage),
    Vote(Vote),
    JudgeVote(JudgeVerdict),
}

pub trait RoundObserver: Send + Sync {
    fn on_event(&self, event: RoundEvent);
}

/// 不关心中间产物的观察者（批量模式）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RoundObserver for NoopObserver {
    fn on_event(&self, _event: RoundEvent) {}
}

impl<F> RoundObserver for F
where
    F: Fn(RoundEvent) + Send + Sync,
{
    fn on_event(&self, event: RoundEvent) {
        self(event)
    }
}
