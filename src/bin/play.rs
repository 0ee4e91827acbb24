//! Arena 无头对局：在终端里跑完整局游戏
//!
//! 用法: cargo run --bin arena-play -- [--agents N] [--strikes N] [问题 ...]
//! 不给问题时轮流使用内置问题，直到游戏结束。

use std::sync::Arc;

use anyhow::{bail, Context};
use arena::{
    config::load_config,
    core::ShutdownManager,
    delivery::{RoundService, StreamEvent},
    game::CreateGameParams,
    llm::create_generation_client,
    observability,
    store::create_game_store,
};

const BUILTIN_QUESTIONS: &[&str] = &[
    "Is social media doing more harm than good?",
    "Should homework be abolished?",
    "Will remote work outlive the office?",
    "Is it ethical to eat meat?",
    "Should voting be mandatory?",
    "Is space exploration worth the money?",
];

/// 没有显式问题时最多进行的回合数
const MAX_AUTO_ROUNDS: usize = 12;

struct PlayArgs {
    params: CreateGameParams,
    questions: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<PlayArgs> {
    let mut params = CreateGameParams::default();
    let mut questions = Vec::new();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--agents" | "--strikes" => {
                let value = it.next().with_context(|| format!("{} needs a value", arg))?;
                let n: i64 = value
                    .parse()
                    .with_context(|| format!("{} expects a number, got {:?}", arg, value))?;
                if arg == "--agents" {
                    params.num_agents = Some(n);
                } else {
                    params.max_strikes = Some(n);
                }
            }
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            _ => questions.push(arg),
        }
    }
    Ok(PlayArgs { params, questions })
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Answer(a) => println!("💬 {}: {}", a.agent_id, a.text),
        StreamEvent::Phase(p) => println!("── {} ──", p.as_str()),
        StreamEvent::Debate(d) => println!("🗣  [turn {}] {}: {}", d.turn, d.agent_id, d.text),
        StreamEvent::Vote(v) => println!("🗳  {} → {} ({})", v.voter_id, v.target_id, v.justification),
        StreamEvent::JudgeVote(j) => println!(
            "⚖️  judge picks {} among {:?} ({})",
            j.target_id, j.tied, j.justification
        ),
        StreamEvent::RoundEnd(outcome) => {
            if outcome.round.eliminated.is_empty() {
                println!("✅ round {} over, nobody eliminated", outcome.round.index);
            } else {
                println!(
                    "❌ round {} over, eliminated: {}",
                    outcome.round.index,
                    outcome.round.eliminated.join(", ")
                );
            }
            for agent in &outcome.game.agents {
                let mark = if agent.eliminated { "out" } else { "in" };
                println!("   {} strikes={} {}", agent.id, agent.strikes, mark);
            }
        }
        StreamEvent::Error(message) => println!("⚠️  round failed: {}", message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = parse_args(std::env::args().skip(1))?;
    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config ({}), using defaults", e);
        Default::default()
    });

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let service = RoundService::from_config(&cfg, create_game_store(), create_generation_client(&cfg))
        .with_shutdown(shutdown.token());
    let game = service.create_game(args.params).await?;
    println!(
        "🎮 game {} with {} agents, {} strikes to elimination",
        game.id,
        game.agents.len(),
        game.max_strikes
    );

    let questions: Vec<String> = if args.questions.is_empty() {
        BUILTIN_QUESTIONS
            .iter()
            .cycle()
            .take(MAX_AUTO_ROUNDS)
            .map(|q| q.to_string())
            .collect()
    } else {
        args.questions
    };

    for question in &questions {
        if shutdown.is_shutdown() {
            break;
        }
        println!("\n❓ {}", question);
        let mut stream = service.play_round_stream(&game.id, question).await?;
        let mut finished = false;
        while let Some(event) = stream.next_event().await {
            print_event(&event);
            finished |= event.is_terminal();
        }
        if !finished {
            println!("⏹  round interrupted, nothing recorded");
            break;
        }
        if service.get_game(&game.id).await?.is_finished() {
            break;
        }
    }

    let game = service.get_game(&game.id).await?;
    let survivors: Vec<&str> = game.active_agents().map(|a| a.id.as_str()).collect();
    println!(
        "\n🏁 {} rounds played, status {:?}, survivors: {}",
        game.rounds.len(),
        game.status,
        if survivors.is_empty() {
            "none".to_string()
        } else {
            survivors.join(", ")
        }
    );
    Ok(())
}
