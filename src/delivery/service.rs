//! 回合服务：批量与流式两种交付方式共用同一个 RoundEngine
//!
//! 批量：NoopObserver 跑完整回合，成功后写回存储并一次性返回 (game, round)。
//! 流式：先同步完成校验与加锁，再在后台任务中执行回合，观察者把每个产物转成 StreamEvent 推入通道；
//! 成功写回后发 round_end，失败发 error，被取消（超时 / 客户端断开）则不发终止事件。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::{AppConfig, GameSection};
use crate::core::GameError;
use crate::delivery::locks::{RoundLocks, RoundPermit};
use crate::delivery::sse::StreamEvent;
use crate::game::{new_game, CreateGameParams, Game};
use crate::llm::RetryingLlmClient;
use crate::round::{NoopObserver, RoundEngine, RoundEvent, RoundObserver, RoundOutcome};
use crate::store::GameStore;

const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Clone)]
pub struct RoundService {
    store: Arc<dyn GameStore>,
    engine: Arc<RoundEngine>,
    locks: RoundLocks,
    defaults: GameSection,
    round_timeout: Duration,
    stream_timeout: Duration,
    /// 所有回合 token 的父 token（进程关闭时统一取消）
    shutdown: CancellationToken,
}

impl RoundService {
    pub fn new(store: Arc<dyn GameStore>, engine: RoundEngine, defaults: GameSection) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            locks: RoundLocks::new(),
            defaults,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &AppConfig, store: Arc<dyn GameStore>, client: RetryingLlmClient) -> Self {
        Self::new(store, RoundEngine::from_config(cfg, client), cfg.game.clone())
            .with_timeouts(cfg.server.round_timeout(), cfg.server.stream_timeout())
    }

    pub fn with_timeouts(mut self, round_timeout: Duration, stream_timeout: Duration) -> Self {
        self.round_timeout = round_timeout;
        self.stream_timeout = stream_timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn create_game(&self, params: CreateGameParams) -> Result<Game, GameError> {
        let game = self.store.create(new_game(params, &self.defaults)?).await?;
        tracing::info!(
            game_id = %game.id,
            agents = game.agents.len(),
            max_strikes = game.max_strikes,
            "game created"
        );
        Ok(game)
    }

    pub async fn get_game(&self, id: &str) -> Result<Game, GameError> {
        self.store.get(id).await
    }

    pub async fn list_games(&self) -> Result<Vec<Game>, GameError> {
        self.store.list().await
    }

    /// 加锁、读取、校验；任何一步失败都不会发起生成调用
    async fn prepare(
        &self,
        game_id: &str,
        question: &str,
    ) -> Result<(RoundPermit, Game, String), GameError> {
        let permit = self.locks.try_acquire(game_id)?;
        let game = self.store.get(game_id).await?;
        let question = RoundEngine::validate(&game, question)?;
        Ok((permit, game, question))
    }

    /// 写回存储；返回存储后的快照
    async fn persist(&self, outcome: RoundOutcome) -> Result<RoundOutcome, GameError> {
        let game = self.store.update(outcome.game).await?;
        Ok(RoundOutcome {
            game,
            round: outcome.round,
        })
    }

    /// 批量模式：完整跑完一回合后返回
    pub async fn play_round(&self, game_id: &str, question: &str) -> Result<RoundOutcome, GameError> {
        let (_permit, game, question) = self.prepare(game_id, question).await?;
        let cancel = self.shutdown.child_token();
        let outcome = self
            .engine
            .run_round(&game, &question, &NoopObserver, &cancel, self.round_timeout)
            .await?;
        self.persist(outcome).await
    }

    /// 流式模式：校验失败直接返回错误（此时尚未产生任何事件），否则返回事件流
    pub async fn play_round_stream(&self, game_id: &str, question: &str) -> Result<RoundStream, GameError> {
        let (permit, game, question) = self.prepare(game_id, question).await?;
        let cancel = self.shutdown.child_token();
        let (tx, rx) = mpsc::unbounded_channel();

        let service = self.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let observer = ChannelObserver {
                tx: tx.clone(),
                cancel: task_cancel.clone(),
            };
            let result = service
                .engine
                .run_round(&game, &question, &observer, &task_cancel, service.stream_timeout)
                .await;

            let terminal = match result {
                // 回合跑完但客户端已经走了：按未发生处理，不写回
                Ok(_) if task_cancel.is_cancelled() => None,
                Ok(outcome) => match service.persist(outcome).await {
                    Ok(outcome) => Some(StreamEvent::RoundEnd(outcome)),
                    Err(e) => Some(StreamEvent::Error(e.to_string())),
                },
                Err(e) if e.is_cancelled() => None,
                Err(e) => Some(StreamEvent::Error(e.to_string())),
            };
            match terminal {
                Some(event) => {
                    let name = event.name();
                    if tx.send(event).is_err() {
                        // round_end 发送失败时回合已写回，客户端需重新 GET 游戏
                        tracing::warn!(
                            game_id = %game.id,
                            event = name,
                            "stream client gone before terminal event"
                        );
                    }
                }
                None => tracing::info!(game_id = %game.id, "streamed round discarded"),
            }
        });

        Ok(RoundStream {
            rx,
            _guard: cancel.drop_guard(),
        })
    }
}

/// 把回合事件推入通道；接收端已关闭（客户端断开）时取消回合
struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
}

impl RoundObserver for ChannelObserver {
    fn on_event(&self, event: RoundEvent) {
        if self.tx.send(event.into()).is_err() && !self.cancel.is_cancelled() {
            tracing::info!("stream client disconnected, cancelling round");
            self.cancel.cancel();
        }
    }
}

/// 流式回合的事件接收端；丢弃即取消后台回合
pub struct RoundStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    _guard: DropGuard,
}

impl RoundStream {
    /// 下一个事件；后台任务结束后返回 None
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}
