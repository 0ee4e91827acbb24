//! SSE 帧编码
//!
//! 每个事件编码为 `event: <name>\ndata: <payload>\n\n`，payload 为 JSON。
//! 事件名按回合顺序：answer、phase、debate、phase、vote、(judge_vote)，最后是 round_end 或 error。

use serde::Serialize;

use crate::game::{Answer, DebateMessage, JudgeVerdict, Vote};
use crate::round::{PhaseMarker, PhasePayload, RoundEvent, RoundOutcome};

/// error 事件的负载：{"error": "..."}
#[derive(Debug, Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

/// 流式回合中推给客户端的一个事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Answer(Answer),
    Phase(PhaseMarker),
    Debate(DebateMessage),
    Vote(Vote),
    JudgeVote(JudgeVerdict),
    RoundEnd(RoundOutcome),
    Error(String),
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Answer(_) => "answer",
            StreamEvent::Phase(_) => "phase",
            StreamEvent::Debate(_) => "debate",
            StreamEvent::Vote(_) => "vote",
            StreamEvent::JudgeVote(_) => "judge_vote",
            StreamEvent::RoundEnd(_) => "round_end",
            StreamEvent::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::RoundEnd(_) | StreamEvent::Error(_))
    }

    /// data 行的 JSON 负载
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamEvent::Answer(a) => serde_json::to_string(a),
            StreamEvent::Phase(p) => serde_json::to_string(&PhasePayload { phase: p.as_str() }),
            StreamEvent::Debate(d) => serde_json::to_string(d),
            StreamEvent::Vote(v) => serde_json::to_string(v),
            StreamEvent::JudgeVote(j) => serde_json::to_string(j),
            StreamEvent::RoundEnd(outcome) => serde_json::to_string(outcome),
            StreamEvent::Error(message) => serde_json::to_string(&ErrorPayload { error: message }),
        }
    }

    /// 完整的 SSE 帧
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), self.payload()?))
    }
}

impl From<RoundEvent> for StreamEvent {
    fn from(event: RoundEvent) -> Self {
        match event {
            RoundEvent::Answer(a) => StreamEvent::Answer(a),
            RoundEvent::Phase(p) => StreamEvent::Phase(p),
            RoundEvent::Debate(d) => StreamEvent::Debate(d),
            RoundEvent::Vote(v) => StreamEvent::Vote(v),
            RoundEvent::JudgeVote(j) => StreamEvent::JudgeVote(j),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_frame_is_exact() {
        let frame = StreamEvent::Phase(PhaseMarker::AnswersDone).encode().unwrap();
        assert_eq!(frame, "event: phase\ndata: {\"phase\":\"answers_done\"}\n\n");
        let frame = StreamEvent::Phase(PhaseMarker::DebateDone).encode().unwrap();
        assert_eq!(frame, "event: phase\ndata: {\"phase\":\"debate_done\"}\n\n");
    }

    #[test]
    fn test_answer_and_error_frames() {
        let answer = StreamEvent::Answer(Answer {
            agent_id: "agent-1".into(),
            text: "line one\nline two".into(),
        });
        assert_eq!(
            answer.encode().unwrap(),
            "event: answer\ndata: {\"agent_id\":\"agent-1\",\"text\":\"line one\\nline two\"}\n\n"
        );

        let error = StreamEvent::Error("game not found: x".into());
        assert_eq!(
            error.encode().unwrap(),
            "event: error\ndata: {\"error\":\"game not found: x\"}\n\n"
        );
        assert!(error.is_terminal());
        assert!(!answer.is_terminal());
    }

    #[test]
    fn test_vote_frame_fields() {
        let vote = StreamEvent::from(RoundEvent::Vote(Vote {
            voter_id: "agent-1".into(),
            target_id: "agent-2".into(),
            justification: "vague".into(),
        }));
        assert_eq!(vote.name(), "vote");
        assert_eq!(
            vote.payload().unwrap(),
            r#"{"voter_id":"agent-1","target_id":"agent-2","justification":"vague"}"#
        );
    }
}
