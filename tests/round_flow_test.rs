//! 整局游戏集成测试：多回合推进直到结束，检查跨回合不变量

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use arena::config::GameSection;
    use arena::delivery::{RoundService, StreamEvent};
    use arena::game::{CreateGameParams, Game, GameStatus};
    use arena::llm::{Purpose, RetryConfig, RetryingLlmClient, ScriptedLlmClient};
    use arena::store::MemoryGameStore;
    use arena::{GameError, RoundEngine};

    /// 投票目标随调用次数轮转，会出现自投、空票与未知 id
    fn churning_client() -> Arc<ScriptedLlmClient> {
        let votes = AtomicUsize::new(0);
        Arc::new(ScriptedLlmClient::new(move |req| {
            let agent = req.agent_id.clone().unwrap_or_default();
            match req.purpose {
                Purpose::Vote => {
                    let n = votes.fetch_add(1, Ordering::SeqCst);
                    let target = match n % 7 {
                        0 => String::new(),
                        1 => agent.clone(),
                        2 => "agent-42".to_string(),
                        k => format!("agent-{}", k % 5 + 1),
                    };
                    Ok(format!(
                        "```json\n{{\"vote_for\": \"{target}\", \"justification\": \"round {n}\"}}\n```"
                    ))
                }
                other => Ok(format!("{} from {}", other.as_str(), agent)),
            }
        }))
    }

    fn service(client: Arc<ScriptedLlmClient>) -> RoundService {
        let engine = RoundEngine::new(RetryingLlmClient::new(client, RetryConfig::default()), 2);
        RoundService::new(Arc::new(MemoryGameStore::new()), engine, GameSection::default())
    }

    fn assert_progress(prev: &Game, next: &Game) {
        assert!(next.active_count() <= prev.active_count());
        assert!(next.status >= prev.status);
        for (before, after) in prev.agents.iter().zip(&next.agents) {
            assert_eq!(before.id, after.id);
            if before.eliminated {
                assert_eq!(before, after);
            } else {
                assert!(after.strikes >= before.strikes);
                assert!(after.strikes - before.strikes <= 1);
            }
        }
    }

    #[tokio::test]
    async fn test_game_runs_to_completion_with_invariants() {
        let client = churning_client();
        let service = service(client.clone());
        let mut game = service
            .create_game(CreateGameParams::new(5, 2))
            .await
            .unwrap();
        assert_eq!(game.status, GameStatus::Waiting);

        let mut rounds = 0;
        while !game.is_finished() && rounds < 20 {
            let outcome = service
                .play_round(&game.id, &format!("Question {}", rounds + 1))
                .await
                .unwrap();
            assert_progress(&game, &outcome.game);
            for vote in &outcome.round.votes {
                assert_ne!(vote.voter_id, vote.target_id);
            }
            for id in &outcome.round.eliminated {
                assert!(outcome.game.agent(id).map(|a| a.eliminated).unwrap_or(false));
            }
            game = outcome.game;
            rounds += 1;
        }

        assert!(game.is_finished(), "game should finish within 20 rounds");
        let indexes: Vec<u32> = game.rounds.iter().map(|r| r.index).collect();
        assert_eq!(indexes, (1..=rounds as u32).collect::<Vec<_>>());
        assert!(game.active_count() <= 1);

        let calls_before = client.call_count();
        let err = service.play_round(&game.id, "One more?").await.unwrap_err();
        assert!(matches!(err, GameError::State(_)));
        assert_eq!(client.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_batch_and_stream_agree() {
        let batch_service = service(churning_client());
        let stream_service = service(churning_client());
        let a = batch_service.create_game(CreateGameParams::new(3, 2)).await.unwrap();
        let b = stream_service.create_game(CreateGameParams::new(3, 2)).await.unwrap();

        let batch = batch_service.play_round(&a.id, "Same question").await.unwrap();

        let mut stream = stream_service.play_round_stream(&b.id, "Same question").await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            events.push(event);
        }
        let Some(StreamEvent::RoundEnd(streamed)) = events.last() else {
            panic!("stream did not end with round_end");
        };

        assert_eq!(batch.round, streamed.round);
        let strikes = |g: &Game| g.agents.iter().map(|a| a.strikes).collect::<Vec<_>>();
        assert_eq!(strikes(&batch.game), strikes(&streamed.game));

        let answers = events.iter().filter(|e| matches!(e, StreamEvent::Answer(_))).count();
        let debates = events.iter().filter(|e| matches!(e, StreamEvent::Debate(_))).count();
        let votes = events.iter().filter(|e| matches!(e, StreamEvent::Vote(_))).count();
        assert_eq!((answers, debates, votes), (3, 6, 3));
    }

    #[tokio::test]
    async fn test_concurrent_rounds_on_same_game_conflict() {
        let service = service(churning_client());
        let game = service.create_game(CreateGameParams::default()).await.unwrap();

        let stream = service.play_round_stream(&game.id, "First").await.unwrap();
        let second = service.play_round(&game.id, "Second").await;
        assert!(matches!(second, Err(GameError::Conflict(_))));
        drop(stream);
    }
}
