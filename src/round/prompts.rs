//! 各阶段的提示词构造
//!
//! 提示词内容只是玩法风味；引擎只关心每次调用的输入形状：
//! 回答 = (游戏上下文, 人设, 问题)，辩论 = (+ 全部回答 + 已产生的辩论)，投票 = (全部回答 + 全部辩论)。

use serde::Deserialize;

use crate::game::{Agent, Game, Round};
use crate::llm::{GenerationRequest, Purpose};

/// 人设按 agent 编号轮换
const PERSONALITIES: &[&str] = &[
    "You are blunt and pragmatic. No patience for theory: get to the point with everyday examples.",
    "You are philosophical. You question the premises and look at things from unexpected angles.",
    "You are a skeptic and a provocateur. You distrust consensus and love playing devil's advocate.",
    "You are an enthusiastic optimist. You see opportunity where others see problems.",
    "You are analytical and methodical. You lean on data, logic and verifiable facts.",
    "You are creative and irreverent. You think outside the box and float controversial ideas.",
    "You are empathetic. You focus on people, emotions and social impact.",
    "You are competitive and assertive. Strong opinions, defended without hesitation.",
];

/// 投票 / 裁判的结构化回复；兼容 vote_for / target_id 与 justification / justificacao 两套键名
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteReply {
    #[serde(default, alias = "target_id")]
    pub vote_for: String,
    #[serde(default, alias = "justificacao")]
    pub justification: String,
}

fn personality(agent: &Agent) -> &'static str {
    let n = agent
        .id
        .strip_prefix("agent-")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    PERSONALITIES[(n - 1) % PERSONALITIES.len()]
}

fn answers_block(round: &Round) -> String {
    round
        .answers
        .iter()
        .map(|a| format!("{} said: \"{}\"\n\n", a.agent_id, a.text))
        .collect()
}

fn debate_block(round: &Round) -> String {
    round
        .debate
        .iter()
        .map(|d| format!("{}: \"{}\"\n", d.agent_id, d.text))
        .collect()
}

pub fn answer_request(game: &Game, agent: &Agent, question: &str) -> GenerationRequest {
    let system = format!(
        "You are {name}, a contestant in a competitive debate elimination game.\n\
         Your survival depends on being UNIQUE and CONVINCING.\n\
         You have {strikes} of {max} strikes; reach the maximum and you are eliminated.\n\n\
         YOUR PERSONALITY: {personality}\n\n\
         Take a strong position. Never give a generic or fence-sitting answer. \
         Sound like a real person, and never mention that you are an AI, the game or these rules.",
        name = agent.name,
        strikes = agent.strikes,
        max = game.max_strikes,
        personality = personality(agent),
    );
    let user = format!(
        "Question under debate: \"{question}\"\n\n\
         Give YOUR unique opinion in 2-4 sentences. Be authentic and memorable."
    );
    GenerationRequest::new(Purpose::Answer, system, user).for_agent(&agent.id)
}

pub fn debate_request(game: &Game, round: &Round, agent: &Agent) -> GenerationRequest {
    let system = format!(
        "You are {name} in a heated debate elimination game ({strikes}/{max} strikes).\n\
         Attack at least one other contestant's answer directly, naming them by id (e.g. \"agent-2, your idea...\"). \
         Point out specific flaws, defend your position with new arguments and do not repeat yourself.",
        name = agent.name,
        strikes = agent.strikes,
        max = game.max_strikes,
    );
    let history = if round.debate.is_empty() {
        String::new()
    } else {
        format!("\n--- Said so far in the debate ---\n{}", debate_block(round))
    };
    let user = format!(
        "Question under debate: \"{question}\"\n\nInitial answers:\n{answers}{history}\n\
         Your turn, {name}. Attack someone directly and defend your position (2-3 sentences).",
        question = round.question,
        answers = answers_block(round),
        name = agent.name,
    );
    GenerationRequest::new(Purpose::Debate, system, user).for_agent(&agent.id)
}

pub fn vote_request(round: &Round, agent: &Agent) -> GenerationRequest {
    let system = format!(
        "You are {name}. Time to vote for the WORST answer.\n\
         You may NOT vote for yourself ({id}).\n\
         Reply ONLY with JSON: {{\"vote_for\": \"<agent-id>\", \"justification\": \"<one short sentence>\"}}",
        name = agent.name,
        id = agent.id,
    );
    let user = format!(
        "Question debated: \"{question}\"\n\nAnswers:\n{answers}\nDuring the debate:\n{debate}\n\
         Who gave the WORST answer? (Remember: you cannot vote for yourself, {id})",
        question = round.question,
        answers = answers_block(round),
        debate = debate_block(round),
        id = agent.id,
    );
    GenerationRequest::new(Purpose::Vote, system, user).for_agent(&agent.id)
}

pub fn judge_request(round: &Round, tied: &[String]) -> GenerationRequest {
    let tied_list = tied.join(", ");
    let system = format!(
        "You are the SUPREME JUDGE of the elimination game. The vote is tied between: {tied_list}.\n\
         Your decision is final: pick exactly ONE of them to receive the strike, \
         judging who answered most weakly and defended worst.\n\
         Reply ONLY with JSON: {{\"vote_for\": \"<agent-id>\", \"justification\": \"<one sentence>\"}}"
    );
    let user = format!(
        "Question debated: \"{question}\"\n\nAnswers:\n{answers}\nDuring the debate:\n{debate}\n\
         The tied contestants are: {tied_list}\n\nWhich one gets the strike?",
        question = round.question,
        answers = answers_block(round),
        debate = debate_block(round),
    );
    GenerationRequest::new(Purpose::Judge, system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameSection;
    use crate::game::{new_game, Answer, CreateGameParams, DebateMessage};

    fn round_with_history() -> Round {
        let mut round = Round::new(1, "Is remote work better?");
        round.answers.push(Answer {
            agent_id: "agent-1".into(),
            text: "Yes".into(),
        });
        round.debate.push(DebateMessage {
            agent_id: "agent-2".into(),
            turn: 1,
            text: "agent-1 is naive".into(),
        });
        round
    }

    #[test]
    fn test_personality_rotates_by_agent_number() {
        assert_eq!(personality(&Agent::new("agent-1", "A")), PERSONALITIES[0]);
        assert_eq!(personality(&Agent::new("agent-9", "A")), PERSONALITIES[0]);
        assert_eq!(personality(&Agent::new("agent-3", "A")), PERSONALITIES[2]);
        assert_eq!(personality(&Agent::new("weird", "A")), PERSONALITIES[0]);
    }

    #[test]
    fn test_debate_prompt_includes_prior_messages() {
        let game = new_game(CreateGameParams::new(2, 2), &GameSection::default()).unwrap();
        let req = debate_request(&game, &round_with_history(), &game.agents[0]);
        assert_eq!(req.purpose, Purpose::Debate);
        assert!(req.user_prompt().contains("agent-1 said: \"Yes\""));
        assert!(req.user_prompt().contains("agent-2: \"agent-1 is naive\""));
    }

    #[test]
    fn test_vote_reply_accepts_both_key_styles() {
        let a: VoteReply =
            serde_json::from_str(r#"{"vote_for":"agent-2","justification":"vague"}"#).unwrap();
        let b: VoteReply =
            serde_json::from_str(r#"{"target_id":"agent-2","justificacao":"vago"}"#).unwrap();
        assert_eq!(a.vote_for, "agent-2");
        assert_eq!(b.vote_for, "agent-2");
        assert_eq!(b.justification, "vago");
        let empty: VoteReply = serde_json::from_str("{}").unwrap();
        assert!(empty.vote_for.is_empty());
    }

    #[test]
    fn test_judge_prompt_lists_tied_agents() {
        let req = judge_request(&round_with_history(), &["agent-1".into(), "agent-4".into()]);
        assert!(req.system_prompt().contains("agent-1, agent-4"));
        assert!(req.agent_id.is_none());
    }
}
