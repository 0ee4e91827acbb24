//! 创建游戏：非正数参数自动修正为默认值，而不是拒绝请求；超过 Agent 上限则拒绝

use crate::config::GameSection;
use crate::core::GameError;
use crate::game::{Agent, Game, GameStatus};

/// 创建游戏的请求参数（HTTP 层直接反序列化，缺省或 ≤0 时使用默认值）
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct CreateGameParams {
    #[serde(default)]
    pub num_agents: Option<i64>,
    #[serde(default)]
    pub max_strikes: Option<i64>,
}

impl CreateGameParams {
    pub fn new(num_agents: i64, max_strikes: i64) -> Self {
        Self {
            num_agents: Some(num_agents),
            max_strikes: Some(max_strikes),
        }
    }
}

/// 修正后的 Agent 数；超过 max_agents 时返回 Validation（在分配任何 Agent 之前）
fn resolve_num_agents(params: &CreateGameParams, defaults: &GameSection) -> Result<usize, GameError> {
    let max_agents = defaults.max_agents.max(1);
    match params.num_agents.filter(|n| *n > 0) {
        Some(n) if n as u64 > max_agents as u64 => Err(GameError::validation(format!(
            "num_agents must be at most {max_agents}, got {n}"
        ))),
        Some(n) => Ok(n as usize),
        None => Ok(defaults.default_agents.clamp(1, max_agents)),
    }
}

/// 构造新游戏：agent-1..agent-N，0 strike，状态 Waiting，无回合
pub fn new_game(params: CreateGameParams, defaults: &GameSection) -> Result<Game, GameError> {
    let num_agents = resolve_num_agents(&params, defaults)?;
    let max_strikes = params
        .max_strikes
        .filter(|n| *n > 0)
        .map(|n| n.min(u32::MAX as i64) as u32)
        .unwrap_or(defaults.default_max_strikes.max(1));

    let agents = (1..=num_agents)
        .map(|i| Agent::new(format!("agent-{i}"), format!("Agent {i}")))
        .collect();

    Ok(Game {
        id: uuid::Uuid::new_v4().to_string(),
        agents,
        rounds: Vec::new(),
        max_strikes,
        status: GameStatus::Waiting,
        version: 0,
    })
}
