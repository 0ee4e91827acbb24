//! 判罚：计票、找出票数最少者、发放 strike 与淘汰
//!
//! 计票对每个活跃 Agent 初始化为 0，所以“一票未得”也参与最小值比较，并且是最差的结果。
//! 默认所有并列最少者都吃 strike（同一回合可能淘汰多人，甚至全部）；可选由裁判在并列者中只选一人。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::GameError;
use crate::game::{Game, JudgeVerdict, Round, Vote};

/// 平局裁判：在并列最少票的 Agent 中选出唯一受罚者
#[async_trait]
pub trait TieBreaker: Send + Sync {
    async fn break_tie(
        &self,
        round: &Round,
        tied: &[String],
        cancel: &CancellationToken,
    ) -> Result<JudgeVerdict, GameError>;
}

/// strike 发放策略
#[derive(Clone, Default)]
pub enum StrikePolicy {
    /// 所有并列最少票者都吃 strike
    #[default]
    StrikeAllAtMinimum,
    /// 多人并列时交给裁判只罚一人
    Judge(Arc<dyn TieBreaker>),
}

impl std::fmt::Debug for StrikePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrikePolicy::StrikeAllAtMinimum => f.write_str("StrikeAllAtMinimum"),
            StrikePolicy::Judge(_) => f.write_str("Judge"),
        }
    }
}

/// 按活跃 Agent 顺序返回 (id, 得票数)；投给非活跃 / 未知 id 的票不计
pub fn tally_votes(active_ids: &[String], votes: &[Vote]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = active_ids.iter().map(|id| (id.as_str(), 0)).collect();
    for vote in votes {
        if let Some(c) = counts.get_mut(vote.target_id.as_str()) {
            *c += 1;
        }
    }
    active_ids
        .iter()
        .map(|id| (id.clone(), counts.get(id.as_str()).copied().unwrap_or(0)))
        .collect()
}

/// 得票等于最小值的全部 Agent（保持活跃顺序）
pub fn lowest_tallied(tally: &[(String, usize)]) -> Vec<String> {
    let Some(min_votes) = tally.iter().map(|(_, c)| *c).min() else {
        return Vec::new();
    };
    tally
        .iter()
        .filter(|(_, c)| *c == min_votes)
        .map(|(id, _)| id.clone())
        .collect()
}

/// 给 penalized 中每个活跃 Agent 加一次 strike，返回本次被淘汰的 id（按 Agent 列表顺序）
pub fn apply_strikes(game: &mut Game, penalized: &[String]) -> Vec<String> {
    let max_strikes = game.max_strikes;
    let mut eliminated = Vec::new();
    for agent in game.agents.iter_mut().filter(|a| a.is_active()) {
        if !penalized.iter().any(|id| *id == agent.id) {
            continue;
        }
        agent.strikes += 1;
        tracing::info!(
            agent = %agent.id,
            strikes = agent.strikes,
            max_strikes,
            "strike issued"
        );
        if agent.strikes >= max_strikes {
            agent.eliminated = true;
            tracing::info!(agent = %agent.id, "agent eliminated");
            eliminated.push(agent.id.clone());
        }
    }
    eliminated
}
