//! 游戏数据模型：Agent、回合产物（回答 / 辩论 / 投票）、Round 与 Game 聚合
//!
//! 字段名与 JSON 输出一致（snake_case），流式事件与批量响应都直接序列化这些结构。

use serde::{Deserialize, Serialize};

/// 参赛 Agent；strikes 只增不减，eliminated 只会 false → true
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub strikes: u32,
    pub eliminated: bool,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            strikes: 0,
            eliminated: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub agent_id: String,
    pub text: String,
}

/// 辩论发言；turn 从 1 开始
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateMessage {
    pub agent_id: String,
    pub turn: u32,
    pub text: String,
}

/// 投票；持久化记录中 target_id 永远不等于 voter_id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: String,
    pub target_id: String,
    pub justification: String,
}

/// 裁判的平局裁决（仅在启用裁判策略且出现多人并列时产生）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub tied: Vec<String>,
    pub target_id: String,
    pub justification: String,
}

/// 一个完整回合；追加到 Game 之后不再修改
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub index: u32,
    pub question: String,
    pub answers: Vec<Answer>,
    pub debate: Vec<DebateMessage>,
    pub votes: Vec<Vote>,
    pub eliminated: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeVerdict>,
}

impl Round {
    pub fn new(index: u32, question: impl Into<String>) -> Self {
        Self {
            index,
            question: question.into(),
            answers: Vec::new(),
            debate: Vec::new(),
            votes: Vec::new(),
            eliminated: Vec::new(),
            judge: None,
        }
    }
}

/// 游戏状态，只会 Waiting → Running → Finished
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Running,
    Finished,
}

/// 游戏聚合：Agent 列表在创建时固定，回合历史只追加
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub agents: Vec<Agent>,
    pub rounds: Vec<Round>,
    pub max_strikes: u32,
    pub status: GameStatus,
    /// 存储层乐观并发版本号，不对外序列化
    #[serde(skip)]
    pub version: u64,
}

impl Game {
    /// 活跃 Agent（未淘汰），保持创建时的顺序
    pub fn active_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_agents().count()
    }

    pub fn next_round_index(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// 按剩余活跃人数推进状态：≤1 人则结束，否则进行中；状态不会回退
    pub fn advance_status(&mut self) {
        let next = if self.active_count() <= 1 {
            GameStatus::Finished
        } else {
            GameStatus::Running
        };
        self.status = self.status.max(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with(n: usize) -> Game {
        Game {
            id: "g".to_string(),
            agents: (1..=n)
                .map(|i| Agent::new(format!("agent-{i}"), format!("Agent {i}")))
                .collect(),
            rounds: Vec::new(),
            max_strikes: 2,
            status: GameStatus::Waiting,
            version: 0,
        }
    }

    #[test]
    fn test_active_agents_keep_list_order() {
        let mut game = game_with(4);
        game.agents[1].eliminated = true;
        let ids: Vec<&str> = game.active_agents().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["agent-1", "agent-3", "agent-4"]);
    }

    #[test]
    fn test_advance_status_never_goes_backward() {
        let mut game = game_with(3);
        game.advance_status();
        assert_eq!(game.status, GameStatus::Running);

        game.agents[0].eliminated = true;
        game.agents[1].eliminated = true;
        game.advance_status();
        assert_eq!(game.status, GameStatus::Finished);

        // 即使人为恢复 Agent，Finished 也不会回到 Running
        game.agents[0].eliminated = false;
        game.advance_status();
        assert_eq!(game.status, GameStatus::Finished);
    }

    #[test]
    fn test_status_serializes_lowercase_and_version_is_hidden() {
        let game = game_with(1);
        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["max_strikes"], 2);
        assert!(json.get("version").is_none());
    }

    #[test]
    fn test_round_omits_judge_when_absent() {
        let round = Round::new(1, "q");
        let json = serde_json::to_value(&round).unwrap();
        assert!(json.get("judge").is_none());
        assert_eq!(json["eliminated"], serde_json::json!([]));
    }
}
