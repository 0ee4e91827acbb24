//! 回合引擎：回答 → 辩论 → 投票 → 判罚 的阶段状态机
//!
//! 所有生成调用严格串行，按活跃 Agent 列表顺序发出；每个阶段步骤读取已有产物、产生一个新产物并通知观察者。
//! 引擎只在输入 Game 的副本上工作，任何失败都直接丢弃整个回合，持久化由交付层负责。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, TieBreakMode};
use crate::core::GameError;
use crate::game::{Agent, Answer, DebateMessage, Game, Round, Vote};
use crate::llm::RetryingLlmClient;
use crate::round::judge::LlmJudge;
use crate::round::observer::{PhaseMarker, RoundEvent, RoundObserver};
use crate::round::prompts::{answer_request, debate_request, vote_request, VoteReply};
use crate::round::resolution::{apply_strikes, lowest_tallied, tally_votes, StrikePolicy};

/// 投票为空或投给自己时，替换目标所附带的理由
pub const FALLBACK_JUSTIFICATION: &str = "No valid vote was cast; defaulting to the next contestant.";

/// 一个成功回合的结果：更新后的 Game 与刚追加的 Round
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub game: Game,
    pub round: Round,
}

pub struct RoundEngine {
    client: RetryingLlmClient,
    debate_turns: u32,
    strike_policy: StrikePolicy,
}

impl RoundEngine {
    pub fn new(client: RetryingLlmClient, debate_turns: u32) -> Self {
        Self {
            client,
            debate_turns,
            strike_policy: StrikePolicy::default(),
        }
    }

    pub fn with_strike_policy(mut self, policy: StrikePolicy) -> Self {
        self.strike_policy = policy;
        self
    }

    /// 按 [game] 段构造；tie_break = "judge" 时用同一个生成客户端挂上 LLM 裁判
    pub fn from_config(cfg: &AppConfig, client: RetryingLlmClient) -> Self {
        let policy = match cfg.game.tie_break {
            TieBreakMode::StrikeAll => StrikePolicy::StrikeAllAtMinimum,
            TieBreakMode::Judge => StrikePolicy::Judge(Arc::new(LlmJudge::new(client.clone()))),
        };
        Self::new(client, cfg.game.debate_turns).with_strike_policy(policy)
    }

    /// 前置校验（不发起任何生成调用）；返回去掉首尾空白的问题
    pub fn validate(game: &Game, question: &str) -> Result<String, GameError> {
        if game.is_finished() {
            return Err(GameError::state(format!("game {} is already finished", game.id)));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(GameError::validation("question must not be empty"));
        }
        if game.active_count() == 0 {
            return Err(GameError::validation(format!(
                "game {} has no active agents",
                game.id
            )));
        }
        Ok(question.to_string())
    }

    /// 执行一个完整回合。
    ///
    /// 成功时返回追加了新回合的 Game 副本；超过 deadline 或 cancel 被触发时返回 Cancelled，
    /// 任何一次生成失败都会中止回合。传入的 game 不会被修改。
    pub async fn run_round(
        &self,
        game: &Game,
        question: &str,
        observer: &dyn RoundObserver,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<RoundOutcome, GameError> {
        let question = Self::validate(game, question)?;
        let started = std::time::Instant::now();

        let result = tokio::time::timeout(
            deadline,
            self.execute(game.clone(), question, observer, cancel),
        )
        .await
        .unwrap_or_else(|_| {
            Err(GameError::Cancelled(format!(
                "deadline of {}s exceeded",
                deadline.as_secs()
            )))
        });

        match &result {
            Ok(outcome) => tracing::info!(
                game_id = %outcome.game.id,
                round = outcome.round.index,
                eliminated = ?outcome.round.eliminated,
                status = ?outcome.game.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "round finished"
            ),
            Err(e) => tracing::warn!(
                game_id = %game.id,
                round = game.next_round_index(),
                kind = e.kind(),
                "round aborted: {}",
                e
            ),
        }
        result
    }

    async fn execute(
        &self,
        mut game: Game,
        question: String,
        observer: &dyn RoundObserver,
        cancel: &CancellationToken,
    ) -> Result<RoundOutcome, GameError> {
        // 回合内的活跃集合在开始时固定，判罚前不会变化
        let active: Vec<Agent> = game.active_agents().cloned().collect();
        let mut round = Round::new(game.next_round_index(), question);
        tracing::info!(
            game_id = %game.id,
            round = round.index,
            agents = active.len(),
            debate_turns = self.debate_turns,
            "round started"
        );

        for agent in &active {
            checkpoint(cancel)?;
            let request = answer_request(&game, agent, &round.question);
            let text = self.client.generate(&request, cancel).await?;
            let answer = Answer {
                agent_id: agent.id.clone(),
                text,
            };
            round.answers.push(answer.clone());
            observer.on_event(RoundEvent::Answer(answer));
        }
        observer.on_event(RoundEvent::Phase(PhaseMarker::AnswersDone));

        for turn in 1..=self.debate_turns {
            for agent in &active {
                checkpoint(cancel)?;
                let request = debate_request(&game, &round, agent);
                let text = self.client.generate(&request, cancel).await?;
                let message = DebateMessage {
                    agent_id: agent.id.clone(),
                    turn,
                    text,
                };
                round.debate.push(message.clone());
                observer.on_event(RoundEvent::Debate(message));
            }
        }
        observer.on_event(RoundEvent::Phase(PhaseMarker::DebateDone));

        for agent in &active {
            checkpoint(cancel)?;
            let reply: VoteReply = self
                .client
                .generate_structured(&vote_request(&round, agent), cancel)
                .await?;
            let vote = normalize_vote(&active, agent, reply)?;
            round.votes.push(vote.clone());
            observer.on_event(RoundEvent::Vote(vote));
        }

        let active_ids: Vec<String> = active.iter().map(|a| a.id.clone()).collect();
        let tally = tally_votes(&active_ids, &round.votes);
        tracing::debug!(round = round.index, ?tally, "votes tallied");
        let lowest = lowest_tallied(&tally);

        let penalized = match &self.strike_policy {
            StrikePolicy::Judge(judge) if lowest.len() > 1 => {
                checkpoint(cancel)?;
                let verdict = judge.break_tie(&round, &lowest, cancel).await?;
                let target = verdict.target_id.clone();
                observer.on_event(RoundEvent::JudgeVote(verdict.clone()));
                round.judge = Some(verdict);
                vec![target]
            }
            _ => lowest,
        };

        round.eliminated = apply_strikes(&mut game, &penalized);
        game.rounds.push(round.clone());
        game.advance_status();

        Ok(RoundOutcome { game, round })
    }
}

/// 每次生成调用之前的挂起点检查
fn checkpoint(cancel: &CancellationToken) -> Result<(), GameError> {
    if cancel.is_cancelled() {
        return Err(GameError::Cancelled("caller went away".to_string()));
    }
    Ok(())
}

/// 空目标或自投替换为列表中第一个“其他”活跃 Agent
fn normalize_vote(active: &[Agent], voter: &Agent, reply: VoteReply) -> Result<Vote, GameError> {
    let target = reply.vote_for.trim();
    if !target.is_empty() && target != voter.id {
        return Ok(Vote {
            voter_id: voter.id.clone(),
            target_id: target.to_string(),
            justification: reply.justification,
        });
    }

    let fallback = active
        .iter()
        .find(|a| a.id != voter.id)
        .ok_or_else(|| GameError::state(format!("{} has nobody else to vote for", voter.id)))?;
    tracing::debug!(voter = %voter.id, target = %fallback.id, "substituting invalid vote");

    let justification = if reply.justification.trim().is_empty() {
        FALLBACK_JUSTIFICATION.to_string()
    } else {
        reply.justification
    };
    Ok(Vote {
        voter_id: voter.id.clone(),
        target_id: fallback.id.clone(),
        justification,
    })
}
