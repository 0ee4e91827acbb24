//! 游戏存储抽象层
//!
//! 定义统一的 Game 存储接口；内存实现用读写锁保护 HashMap，并通过版本号做乐观并发控制：
//! update 时提交的版本必须与存储中的一致，成功后版本号 +1。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::GameError;
use crate::game::Game;

/// 游戏存储接口（并发安全；同一 id 读己之写）
#[async_trait]
pub trait GameStore: Send + Sync {
    /// 新建游戏；id 已存在时返回 Conflict
    async fn create(&self, game: Game) -> Result<Game, GameError>;

    /// 按 id 获取游戏快照
    async fn get(&self, id: &str) -> Result<Game, GameError>;

    /// 写回游戏；不存在返回 NotFound，版本过期返回 Conflict。返回写入后的快照（版本已递增）
    async fn update(&self, game: Game) -> Result<Game, GameError>;

    /// 列出所有游戏（按 id 排序）
    async fn list(&self) -> Result<Vec<Game>, GameError>;
}

/// 内存游戏存储
#[derive(Default)]
pub struct MemoryGameStore {
    games: RwLock<HashMap<String, Game>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create(&self, mut game: Game) -> Result<Game, GameError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.id) {
            return Err(GameError::conflict(format!("game {} already exists", game.id)));
        }
        game.version = 1;
        games.insert(game.id.clone(), game.clone());
        Ok(game)
    }

    async fn get(&self, id: &str) -> Result<Game, GameError> {
        self.games
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(id.to_string()))
    }

    async fn update(&self, mut game: Game) -> Result<Game, GameError> {
        let mut games = self.games.write().await;
        let stored = games
            .get_mut(&game.id)
            .ok_or_else(|| GameError::NotFound(game.id.clone()))?;
        if stored.version != game.version {
            tracing::warn!(
                game_id = %game.id,
                stored = stored.version,
                submitted = game.version,
                "rejecting stale game update"
            );
            return Err(GameError::conflict(format!(
                "game {} was modified concurrently",
                game.id
            )));
        }
        game.version += 1;
        *stored = game.clone();
        Ok(game)
    }

    async fn list(&self) -> Result<Vec<Game>, GameError> {
        let mut all: Vec<Game> = self.games.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// 创建默认存储（当前仅内存实现）
pub fn create_game_store() -> Arc<dyn GameStore> {
    tracing::info!("Using in-memory game store");
    Arc::new(MemoryGameStore::new())
}
