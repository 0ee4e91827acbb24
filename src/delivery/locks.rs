//! 每个游戏的回合互斥：同一游戏同一时刻最多一个进行中的回合
//!
//! 锁是建议性的，只在交付层使用；存储层的版本号兜底处理绕过交付层的并发写。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::GameError;

#[derive(Clone, Debug, Default)]
pub struct RoundLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl RoundLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 立即尝试占用；已被占用时返回 Conflict（不等待）
    pub fn try_acquire(&self, game_id: &str) -> Result<RoundPermit, GameError> {
        if !self.lock_held().insert(game_id.to_string()) {
            tracing::warn!(game_id, "round already in progress");
            return Err(GameError::conflict(format!(
                "a round is already in progress for game {game_id}"
            )));
        }
        Ok(RoundPermit {
            held: Arc::clone(&self.held),
            game_id: game_id.to_string(),
        })
    }

    pub fn is_locked(&self, game_id: &str) -> bool {
        self.lock_held().contains(game_id)
    }

    fn lock_held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 持有期间该游戏不能开始新回合；Drop 时释放
#[derive(Debug)]
pub struct RoundPermit {
    held: Arc<Mutex<HashSet<String>>>,
    game_id: String,
}

impl RoundPermit {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }
}

impl Drop for RoundPermit {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.game_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_conflicts_until_release() {
        let locks = RoundLocks::new();
        let permit = locks.try_acquire("g1").unwrap();
        assert_eq!(permit.game_id(), "g1");
        assert!(matches!(locks.try_acquire("g1"), Err(GameError::Conflict(_))));
        // 其他游戏不受影响
        let _other = locks.try_acquire("g2").unwrap();

        drop(permit);
        assert!(!locks.is_locked("g1"));
        assert!(locks.try_acquire("g1").is_ok());
    }
}
